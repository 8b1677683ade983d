//! Wire types for the answer-generation service
//!
//! Request bodies mirror what the service expects; every generation endpoint
//! answers with a `{ "response": "..." }` envelope.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest and largest number of questions a quiz request may ask for
pub const QUIZ_QUESTION_RANGE: (u32, u32) = (1, 10);

/// Default number of quiz questions and flashcards requested
pub const DEFAULT_ITEM_COUNT: u32 = 5;

/// Default number of document chunks used as grounding context
pub const DEFAULT_CONTEXT_CHUNKS: u32 = 2;

/// Request for a tutoring answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AskRequest {
    pub question: String,
}

/// Quiz difficulty
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        };
        f.write_str(label)
    }
}

/// Request for a generated multiple-choice quiz
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizRequest {
    pub topic: String,
    pub difficulty: Difficulty,
    pub num_questions: u32,
}

impl QuizRequest {
    /// Creates a request, clamping the question count into the accepted range
    pub fn new(topic: impl Into<String>, difficulty: Difficulty, num_questions: u32) -> Self {
        let (min, max) = QUIZ_QUESTION_RANGE;
        Self {
            topic: topic.into(),
            difficulty,
            num_questions: num_questions.clamp(min, max),
        }
    }
}

/// Request for generated flashcards
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlashcardRequest {
    pub subject: String,
    pub num_cards: u32,
}

impl FlashcardRequest {
    pub fn new(subject: impl Into<String>, num_cards: u32) -> Self {
        Self {
            subject: subject.into(),
            num_cards: num_cards.max(1),
        }
    }
}

/// Question answered against the uploaded document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentQuery {
    pub query: String,
    pub context_chunks: u32,
}

impl DocumentQuery {
    pub fn new(query: impl Into<String>, context_chunks: u32) -> Self {
        Self {
            query: query.into(),
            context_chunks: context_chunks.max(1),
        }
    }
}

/// State of the document held by the service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentStatus {
    pub pdf_loaded: bool,
    pub chunks_available: usize,
    pub status: String,
}

/// Acknowledgement of a document clear
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClearResponse {
    pub message: String,
    pub status: String,
}

/// Envelope returned by generation endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct GenerationResponse {
    pub response: Option<String>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quiz_request_clamps_question_count() {
        assert_eq!(QuizRequest::new("t", Difficulty::Easy, 0).num_questions, 1);
        assert_eq!(QuizRequest::new("t", Difficulty::Easy, 25).num_questions, 10);
        assert_eq!(QuizRequest::new("t", Difficulty::Easy, 7).num_questions, 7);
    }

    #[test]
    fn test_quiz_request_wire_shape() {
        let request = QuizRequest::new("photosynthesis", Difficulty::Hard, 3);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "topic": "photosynthesis",
                "difficulty": "hard",
                "num_questions": 3
            })
        );
    }

    #[test]
    fn test_minimum_counts() {
        assert_eq!(FlashcardRequest::new("s", 0).num_cards, 1);
        assert_eq!(DocumentQuery::new("q", 0).context_chunks, 1);
        assert_eq!(Difficulty::default(), Difficulty::Medium);
    }
}
