//! Error types for crag.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application: configuration, I/O, model providers, the knowledge
//! store, role prompts and the orchestration loop.

use thiserror::Error;

/// Unified error type for crag.
///
/// All fallible functions return `Result<T, AppError>`. Decode failures of
/// structured role output never become an `AppError`; they resolve to a
/// fallback value inside the parser.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration and credential errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Model provider errors (network, HTTP status, malformed envelope)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Knowledge store errors (fetching, embedding, indexing, search)
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Role prompt errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Orchestration loop errors
    #[error("Orchestration error: {0}")]
    Orchestration(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
