//! crag core library
//!
//! Foundational utilities shared by every crag crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management
//! - Provider credentials

pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::AppConfig;
pub use credentials::Credentials;
pub use error::{AppError, AppResult};
