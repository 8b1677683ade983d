//! Studymate library crate
//!
//! A branching tutor conversation, parsers for generated quizzes and
//! flashcards, a client for the answer-generation service and a local store
//! for saved material.

pub mod api;
pub mod cli;
pub mod guide;
pub mod models;
pub mod parser;
pub mod render;
pub mod storage;
pub mod tutor;

pub use models::{Conversation, ConversationNode, Message, NodeId, Role, ThreadNode};
pub use parser::{extract_flashcards, extract_quiz, Choice, ExtractionError, Flashcard, QuizRecord};
pub use render::{LeafRenderer, MathMarkdown, PlainText};
pub use storage::{LocalStore, StoreError};
pub use tutor::{Exchange, ExchangeState, Slot, Tutor, TutorError, TutorMode};
