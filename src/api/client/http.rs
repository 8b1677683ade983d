//! HTTP client implementation
//!
//! This module talks to the answer-generation service over HTTP with reqwest.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, Error as ReqwestError, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use super::Client;
use crate::api::types::{
    AskRequest, ClearResponse, DocumentQuery, DocumentStatus, FlashcardRequest,
    GenerationResponse, QuizRequest,
};

/// Default address of the answer-generation service
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// API client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request never produced a usable HTTP exchange
    #[error("HTTP error: {0}")]
    Http(#[from] ReqwestError),

    /// The service answered with an application error
    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Missing data in response")]
    MissingData,
}

impl ClientError {
    /// True for network-level failures, as opposed to errors reported by the service
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Http(_) | ClientError::Decode(_))
    }
}

/// HTTP implementation of [`Client`]
#[derive(Debug, Clone)]
pub struct HttpClientImpl {
    http_client: Arc<ReqwestClient>,
    config: ClientConfig,
}

impl HttpClientImpl {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self, ClientError> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self, ClientError> {
        let http_client = ReqwestClient::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http_client: Arc::new(http_client),
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// POST to a generation endpoint and unwrap the `response` text
    async fn generate<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<String, ClientError> {
        let url = self.url(path);
        info!(%url, "sending generation request");

        let response = self.http_client.post(&url).json(body).send().await?;
        let envelope: GenerationResponse = read_json(response).await?;

        // the service reports some failures as `{ "error": ... }` with a 200
        if let Some(error) = envelope.error {
            return Err(ClientError::Api(error));
        }

        let text = envelope.response.ok_or(ClientError::MissingData)?;
        debug!(%url, chars = text.len(), "generation request completed");
        Ok(text)
    }
}

/// Reads a JSON body, turning non-success statuses into [`ClientError::Api`]
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ClientError::Api(
            error_detail(&body).unwrap_or_else(|| format!("HTTP error: {}", status)),
        ));
    }

    Ok(serde_json::from_str(&body)?)
}

/// Pulls a human-readable message out of an error body
fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail").or_else(|| value.get("error"))? {
        serde_json::Value::String(message) => Some(message.clone()),
        serde_json::Value::Null => None,
        // validation failures carry a list of problems
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl Client for HttpClientImpl {
    async fn ask(&self, question: String) -> Result<String, ClientError> {
        self.generate("/math", &AskRequest { question }).await
    }

    async fn generate_quiz(&self, request: QuizRequest) -> Result<String, ClientError> {
        self.generate("/quiz", &request).await
    }

    async fn generate_flashcards(&self, request: FlashcardRequest) -> Result<String, ClientError> {
        self.generate("/flashcards", &request).await
    }

    async fn query_document(&self, query: DocumentQuery) -> Result<String, ClientError> {
        self.generate("/pdf/query", &query).await
    }

    async fn document_status(&self) -> Result<DocumentStatus, ClientError> {
        let url = self.url("/pdf/status");
        let response = self.http_client.get(&url).send().await?;
        read_json(response).await
    }

    async fn clear_document(&self) -> Result<ClearResponse, ClientError> {
        let url = self.url("/pdf/clear");
        info!(%url, "clearing document");
        let response = self.http_client.post(&url).send().await?;
        read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_detail_variants() {
        assert_eq!(
            error_detail(r#"{"detail": "No PDF has been processed."}"#),
            Some("No PDF has been processed.".to_string())
        );
        assert_eq!(
            error_detail(r#"{"error": "quota exceeded"}"#),
            Some("quota exceeded".to_string())
        );
        assert_eq!(
            error_detail(r#"{"detail": [{"msg": "field required"}]}"#),
            Some(r#"[{"msg":"field required"}]"#.to_string())
        );
        assert_eq!(error_detail("<html>bad gateway</html>"), None);
        assert_eq!(error_detail(r#"{"detail": null}"#), None);
    }

    #[test]
    fn test_url_joining() {
        let client = HttpClientImpl::with_config(ClientConfig {
            base_url: "http://localhost:9000/".to_string(),
            ..ClientConfig::default()
        })
        .unwrap();
        assert_eq!(client.url("/quiz"), "http://localhost:9000/quiz");
    }
}
