//! Client trait definition
//!
//! This module defines the `Client` trait that abstracts over different
//! answer-generation backends.

use super::ClientError;
use crate::api::types::{
    ClearResponse, DocumentQuery, DocumentStatus, FlashcardRequest, QuizRequest,
};

/// Trait defining the interface of the remote answer-generation service
#[async_trait::async_trait]
pub trait Client: Send + Sync {
    /// Ask a tutoring question and get the raw answer text
    async fn ask(&self, question: String) -> Result<String, ClientError>;

    /// Generate quiz text, to be parsed with [`crate::parser::extract_quiz`]
    async fn generate_quiz(&self, request: QuizRequest) -> Result<String, ClientError>;

    /// Generate flashcard text, to be parsed with [`crate::parser::extract_flashcards`]
    async fn generate_flashcards(&self, request: FlashcardRequest) -> Result<String, ClientError>;

    /// Ask a question grounded in the uploaded document
    async fn query_document(&self, query: DocumentQuery) -> Result<String, ClientError>;

    /// Get the state of the uploaded document
    async fn document_status(&self) -> Result<DocumentStatus, ClientError>;

    /// Drop the uploaded document from the service
    async fn clear_document(&self) -> Result<ClearResponse, ClientError>;
}
