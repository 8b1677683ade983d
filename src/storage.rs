//! Local persistence of study material
//!
//! Saved notes, flashcard sets and quizzes live as JSON arrays in one file
//! per collection under a data directory. Every record gets an id and a
//! creation timestamp when it is saved.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::Difficulty;
use crate::parser::{Choice, Flashcard, QuizRecord};

/// Identifier of a saved record
///
/// Ids are millisecond timestamps, bumped when two saves land in the same
/// millisecond, so they grow in save order within a collection.
pub type RecordId = i64;

/// The collections kept by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Notes,
    FlashcardSets,
    Quizzes,
}

impl Collection {
    fn file_name(&self) -> &'static str {
        match self {
            Collection::Notes => "notes.json",
            Collection::FlashcardSets => "flashcards.json",
            Collection::Quizzes => "quizzes.json",
        }
    }
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} is not a valid record file: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Something the store can stamp with an id
trait Record: Serialize + DeserializeOwned {
    fn id(&self) -> RecordId;
}

/// A highlighted passage kept for later
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: RecordId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A saved deck of flashcards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardSet {
    pub id: RecordId,
    pub subject: String,
    pub cards: Vec<Flashcard>,
    pub created_at: DateTime<Utc>,
}

/// How many answers of a quiz were right
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub correct: usize,
    pub total: usize,
    pub percentage: u32,
}

impl Score {
    /// Scores `answers` (question position → chosen label) against `questions`
    pub fn calculate(questions: &[QuizRecord], answers: &BTreeMap<usize, Choice>) -> Self {
        if questions.is_empty() {
            return Self::default();
        }

        let correct = questions
            .iter()
            .enumerate()
            .filter(|(idx, question)| {
                question.correct_answer.is_some() && answers.get(idx) == question.correct_answer.as_ref()
            })
            .count();
        let total = questions.len();
        let percentage = ((correct as f64 / total as f64) * 100.0).round() as u32;

        Self {
            correct,
            total,
            percentage,
        }
    }
}

/// A quiz with the answers given and the resulting score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedQuiz {
    pub id: RecordId,
    pub topic: String,
    pub difficulty: Difficulty,
    pub questions: Vec<QuizRecord>,
    pub user_answers: BTreeMap<usize, Choice>,
    pub score: Score,
    pub created_at: DateTime<Utc>,
}

impl Record for Note {
    fn id(&self) -> RecordId {
        self.id
    }
}

impl Record for FlashcardSet {
    fn id(&self) -> RecordId {
        self.id
    }
}

impl Record for SavedQuiz {
    fn id(&self) -> RecordId {
        self.id
    }
}

/// File-backed store rooted at a data directory
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Creates a store rooted at `root`; the directory is created on first save
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The default data directory, `<platform data dir>/studymate`
    pub fn default_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("studymate")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // Notes

    pub fn save_note(&self, content: impl Into<String>) -> Result<Note, StoreError> {
        let content = content.into();
        self.append(Collection::Notes, |id, created_at| Note {
            id,
            content,
            created_at,
        })
    }

    pub fn notes(&self) -> Result<Vec<Note>, StoreError> {
        self.load(Collection::Notes)
    }

    pub fn delete_note(&self, id: RecordId) -> Result<bool, StoreError> {
        self.delete::<Note>(Collection::Notes, id)
    }

    // Flashcard sets

    pub fn save_flashcard_set(
        &self,
        subject: impl Into<String>,
        cards: Vec<Flashcard>,
    ) -> Result<FlashcardSet, StoreError> {
        let subject = subject.into();
        self.append(Collection::FlashcardSets, |id, created_at| FlashcardSet {
            id,
            subject,
            cards,
            created_at,
        })
    }

    pub fn flashcard_sets(&self) -> Result<Vec<FlashcardSet>, StoreError> {
        self.load(Collection::FlashcardSets)
    }

    pub fn flashcard_set(&self, id: RecordId) -> Result<Option<FlashcardSet>, StoreError> {
        Ok(self.flashcard_sets()?.into_iter().find(|set| set.id == id))
    }

    pub fn delete_flashcard_set(&self, id: RecordId) -> Result<bool, StoreError> {
        self.delete::<FlashcardSet>(Collection::FlashcardSets, id)
    }

    // Quizzes

    /// Saves a quiz, scoring `user_answers` against the questions
    pub fn save_quiz(
        &self,
        topic: impl Into<String>,
        difficulty: Difficulty,
        questions: Vec<QuizRecord>,
        user_answers: BTreeMap<usize, Choice>,
    ) -> Result<SavedQuiz, StoreError> {
        let topic = topic.into();
        let score = Score::calculate(&questions, &user_answers);
        self.append(Collection::Quizzes, |id, created_at| SavedQuiz {
            id,
            topic,
            difficulty,
            questions,
            user_answers,
            score,
            created_at,
        })
    }

    pub fn quizzes(&self) -> Result<Vec<SavedQuiz>, StoreError> {
        self.load(Collection::Quizzes)
    }

    pub fn quiz(&self, id: RecordId) -> Result<Option<SavedQuiz>, StoreError> {
        Ok(self.quizzes()?.into_iter().find(|quiz| quiz.id == id))
    }

    pub fn delete_quiz(&self, id: RecordId) -> Result<bool, StoreError> {
        self.delete::<SavedQuiz>(Collection::Quizzes, id)
    }

    // Generic collection access

    fn path(&self, collection: Collection) -> PathBuf {
        self.root.join(collection.file_name())
    }

    /// Loads a collection; a missing file is an empty collection
    fn load<T: Record>(&self, collection: Collection) -> Result<Vec<T>, StoreError> {
        let path = self.path(collection);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt { path, source })
    }

    fn store<T: Record>(&self, collection: Collection, records: &[T]) -> Result<(), StoreError> {
        let path = self.path(collection);
        fs::create_dir_all(&self.root).map_err(|source| StoreError::Io {
            path: self.root.clone(),
            source,
        })?;

        let json = serde_json::to_string_pretty(records).map_err(|source| StoreError::Corrupt {
            path: path.clone(),
            source,
        })?;

        // write then rename so a crash never leaves a half-written file
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, json).map_err(|source| StoreError::Io {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| StoreError::Io { path, source })
    }

    fn append<T, F>(&self, collection: Collection, build: F) -> Result<T, StoreError>
    where
        T: Record + Clone,
        F: FnOnce(RecordId, DateTime<Utc>) -> T,
    {
        let mut records: Vec<T> = self.load(collection)?;
        let created_at = Utc::now();
        let newest = records.iter().map(Record::id).max();
        let id = next_id(created_at.timestamp_millis(), newest);

        let record = build(id, created_at);
        records.push(record.clone());
        self.store(collection, &records)?;

        info!(?collection, id, "saved record");
        Ok(record)
    }

    fn delete<T: Record>(&self, collection: Collection, id: RecordId) -> Result<bool, StoreError> {
        let mut records: Vec<T> = self.load(collection)?;
        let before = records.len();
        records.retain(|record| record.id() != id);

        if records.len() == before {
            debug!(?collection, id, "nothing to delete");
            return Ok(false);
        }

        self.store(collection, &records)?;
        info!(?collection, id, "deleted record");
        Ok(true)
    }
}

fn next_id(now_millis: i64, newest: Option<RecordId>) -> RecordId {
    match newest {
        Some(newest) if newest >= now_millis => newest.saturating_add(1),
        _ => now_millis,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn question(correct: Choice) -> QuizRecord {
        QuizRecord {
            question: "q".to_string(),
            options: Choice::ALL
                .iter()
                .map(|c| (*c, format!("option {}", c)))
                .collect(),
            correct_answer: Some(correct),
            explanation: String::new(),
        }
    }

    #[test]
    fn test_next_id_is_strictly_increasing() {
        assert_eq!(next_id(1_000, None), 1_000);
        assert_eq!(next_id(1_000, Some(999)), 1_000);
        assert_eq!(next_id(1_000, Some(1_000)), 1_001);
        assert_eq!(next_id(1_000, Some(1_500)), 1_501);
    }

    #[test]
    fn test_next_id_saturates_at_max() {
        assert_eq!(next_id(1_000, Some(i64::MAX)), i64::MAX);
    }

    #[test]
    fn test_score_calculation() {
        let questions = vec![question(Choice::A), question(Choice::B), question(Choice::C)];
        let answers: BTreeMap<usize, Choice> =
            [(0, Choice::A), (1, Choice::D), (2, Choice::C)].into_iter().collect();

        assert_eq!(
            Score::calculate(&questions, &answers),
            Score {
                correct: 2,
                total: 3,
                percentage: 67,
            }
        );
    }

    #[test]
    fn test_score_of_empty_quiz_is_zero() {
        assert_eq!(Score::calculate(&[], &BTreeMap::new()), Score::default());
    }

    #[test]
    fn test_unanswered_questions_count_as_wrong() {
        let questions = vec![question(Choice::A), question(Choice::B)];
        let answers: BTreeMap<usize, Choice> = [(0, Choice::A)].into_iter().collect();
        let score = Score::calculate(&questions, &answers);
        assert_eq!(score.correct, 1);
        assert_eq!(score.percentage, 50);
    }

    #[test]
    fn test_collection_files() {
        let store = LocalStore::new("/tmp/studymate-test");
        assert_eq!(
            store.path(Collection::FlashcardSets),
            PathBuf::from("/tmp/studymate-test/flashcards.json")
        );
    }
}
