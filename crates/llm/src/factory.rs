//! LLM provider factory.
//!
//! Creates LLM clients from a provider name plus the endpoint, key and
//! timeout resolved from application configuration.

use crate::client::LlmClient;
use crate::providers::{GeminiClient, OllamaClient};
use crag_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("gemini", "ollama")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - API key for providers that require it
/// * `timeout` - Optional per-request timeout
///
/// # Errors
/// Returns [`AppError::Config`] if the provider is unknown or a required key
/// is missing, [`AppError::Llm`] if the HTTP client cannot be built.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    timeout: Option<Duration>,
) -> AppResult<Arc<dyn LlmClient>> {
    match provider.to_lowercase().as_str() {
        "gemini" => {
            let api_key = api_key.ok_or_else(|| {
                AppError::Config("Gemini provider requires API key".to_string())
            })?;
            let client = GeminiClient::with_options(api_key, endpoint, timeout)?;
            Ok(Arc::new(client))
        }
        "ollama" => {
            let base_url = endpoint.unwrap_or(crate::providers::ollama::DEFAULT_OLLAMA_URL);
            let client = match timeout {
                Some(timeout) => OllamaClient::with_timeout(base_url, timeout)?,
                None => OllamaClient::with_base_url(base_url),
            };
            Ok(Arc::new(client))
        }
        _ => Err(AppError::Config(format!("Unknown provider: {}", provider))),
    }
}
