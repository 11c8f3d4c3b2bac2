//! LLM integration crate for crag.
//!
//! Provider-agnostic abstraction for calling chat models. Every role in the
//! orchestration pipeline reaches its model through [`LlmClient`].
//!
//! # Providers
//! - **Gemini**: Google's hosted models (default)
//! - **Ollama**: Local LLM runtime
//!
//! # Example
//! ```no_run
//! use crag_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Hello, world!", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{GeminiClient, OllamaClient};
