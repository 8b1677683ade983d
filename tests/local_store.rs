use std::collections::BTreeMap;
use std::fs;

use pretty_assertions::assert_eq;
use studymate::api::Difficulty;
use studymate::storage::Score;
use studymate::{extract_flashcards, extract_quiz, Choice, LocalStore, StoreError};
use tempfile::TempDir;

const QUIZ_TEXT: &str = "Q1. 2+2?
A. 3
B. 4
C. 5
D. 22
Correct Answer: B
Explanation: Basic addition.
Q2. Capital of France?
A. Paris
B. Rome
C. Madrid
D. Berlin
Correct Answer: A";

fn store() -> (TempDir, LocalStore) {
    let dir = TempDir::new().unwrap();
    let store = LocalStore::new(dir.path().join("data"));
    (dir, store)
}

#[test]
fn test_missing_files_are_empty_collections() {
    let (_dir, store) = store();
    assert!(store.notes().unwrap().is_empty());
    assert!(store.flashcard_sets().unwrap().is_empty());
    assert!(store.quizzes().unwrap().is_empty());
    assert_eq!(store.quiz(1).unwrap(), None);
}

#[test]
fn test_notes_round_trip_and_delete() {
    let (_dir, store) = store();
    let first = store.save_note("chain rule").unwrap();
    let second = store.save_note("product rule").unwrap();
    assert!(second.id > first.id);

    let contents: Vec<String> = store.notes().unwrap().into_iter().map(|n| n.content).collect();
    assert_eq!(contents, vec!["chain rule", "product rule"]);

    assert!(store.delete_note(first.id).unwrap());
    assert!(!store.delete_note(first.id).unwrap());
    assert_eq!(store.notes().unwrap(), vec![second]);
}

#[test]
fn test_ids_increase_across_rapid_saves() {
    let (_dir, store) = store();
    let ids: Vec<i64> = (0..20)
        .map(|i| store.save_note(format!("note {}", i)).unwrap().id)
        .collect();
    assert!(ids.windows(2).all(|pair| pair[1] > pair[0]));
}

#[test]
fn test_flashcard_sets_are_found_by_id() {
    let (_dir, store) = store();
    let cards = extract_flashcards("Q: 2+2? A: 4 Q: 3+3? A: 6").unwrap();
    let saved = store.save_flashcard_set("arithmetic", cards.clone()).unwrap();

    let loaded = store.flashcard_set(saved.id).unwrap().unwrap();
    assert_eq!(loaded.subject, "arithmetic");
    assert_eq!(loaded.cards, cards);
    assert!(store.delete_flashcard_set(saved.id).unwrap());
    assert_eq!(store.flashcard_set(saved.id).unwrap(), None);
}

#[test]
fn test_saved_quiz_keeps_answers_and_score() {
    let (_dir, store) = store();
    let questions = extract_quiz(QUIZ_TEXT).unwrap();
    let answers: BTreeMap<usize, Choice> = [(0, Choice::B), (1, Choice::C)].into_iter().collect();

    let saved = store
        .save_quiz("mixed", Difficulty::Easy, questions.clone(), answers.clone())
        .unwrap();
    assert_eq!(
        saved.score,
        Score {
            correct: 1,
            total: 2,
            percentage: 50,
        }
    );

    // a fresh handle reads what the first one wrote
    let reopened = LocalStore::new(store.root());
    let loaded = reopened.quiz(saved.id).unwrap().unwrap();
    assert_eq!(loaded.questions, questions);
    assert_eq!(loaded.user_answers, answers);
    assert_eq!(loaded.difficulty, Difficulty::Easy);
    assert_eq!(loaded, saved);
}

#[test]
fn test_corrupt_file_is_an_error_and_left_alone() {
    let (_dir, store) = store();
    fs::create_dir_all(store.root()).unwrap();
    let path = store.root().join("notes.json");
    fs::write(&path, "{ not json").unwrap();

    assert!(matches!(store.notes(), Err(StoreError::Corrupt { .. })));
    assert!(matches!(
        store.save_note("lost?"),
        Err(StoreError::Corrupt { .. })
    ));
    assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
}
