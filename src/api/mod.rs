//! API module
//!
//! This module provides the client side of the answer-generation service:
//! the wire types, the client trait and its HTTP implementation.

pub mod client;
pub mod types;

// Re-export commonly used types
pub use client::{Client, ClientConfig, ClientError, HttpClientImpl};
pub use types::{
    ClearResponse, Difficulty, DocumentQuery, DocumentStatus, FlashcardRequest, QuizRequest,
};
