//! Client module
//!
//! This module provides HTTP client functionality to talk to the
//! answer-generation service.

mod http;
mod trait_def;

// Re-export the trait and types
pub use http::{ClientConfig, ClientError, HttpClientImpl, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
pub use trait_def::Client;
