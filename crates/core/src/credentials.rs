//! Provider credentials.
//!
//! Two secrets gate startup: the model-provider key and the embedding-provider
//! key. Roles and the knowledge store are only constructed once both resolve.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

/// Resolved secrets for the active providers.
#[derive(Clone, Default)]
pub struct Credentials {
    /// Key for the chat model provider (absent for keyless providers)
    pub model_api_key: Option<String>,

    /// Key for the embedding provider (absent for keyless providers)
    pub embedding_api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("model_api_key", &self.model_api_key.as_ref().map(|_| "<redacted>"))
            .field(
                "embedding_api_key",
                &self.embedding_api_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl Credentials {
    /// Resolve credentials from the process environment.
    pub fn resolve(config: &AppConfig) -> AppResult<Self> {
        Self::resolve_with(config, |name| std::env::var(name).ok())
    }

    /// Resolve credentials using `lookup` for environment variables.
    ///
    /// Fails with [`AppError::Config`] naming the variable that is missing.
    pub fn resolve_with<F>(config: &AppConfig, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let model_api_key = if provider_requires_key(&config.provider) {
            let key = config.api_key.clone().or_else(|| {
                config
                    .get_provider_config(&config.provider)
                    .and_then(|pc| pc.api_key_env.as_deref())
                    .and_then(&lookup)
            });

            match key.filter(|k| !k.trim().is_empty()) {
                Some(key) => Some(key),
                None => {
                    let env_name = config
                        .get_provider_config(&config.provider)
                        .and_then(|pc| pc.api_key_env.clone())
                        .unwrap_or_else(|| "CRAG_API_KEY".to_string());
                    return Err(AppError::Config(format!(
                        "Missing API key for provider '{}': set {}",
                        config.provider, env_name
                    )));
                }
            }
        } else {
            None
        };

        let embedding_api_key = if embedder_requires_key(&config.embedding.provider) {
            match lookup(&config.embedding.api_key_env).filter(|k| !k.trim().is_empty()) {
                Some(key) => Some(key),
                None => {
                    return Err(AppError::Config(format!(
                        "Missing API key for embedding provider '{}': set {}",
                        config.embedding.provider, config.embedding.api_key_env
                    )));
                }
            }
        } else {
            None
        };

        Ok(Self {
            model_api_key,
            embedding_api_key,
        })
    }
}

fn provider_requires_key(provider: &str) -> bool {
    provider == "gemini"
}

fn embedder_requires_key(provider: &str) -> bool {
    provider == "openai"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_both_keys_present() {
        let config = AppConfig::default();
        let creds = Credentials::resolve_with(
            &config,
            env(&[("GOOGLE_API_KEY", "g-key"), ("OPENAI_API_KEY", "o-key")]),
        )
        .unwrap();

        assert_eq!(creds.model_api_key.as_deref(), Some("g-key"));
        assert_eq!(creds.embedding_api_key.as_deref(), Some("o-key"));
    }

    #[test]
    fn test_missing_model_key_halts() {
        let config = AppConfig::default();
        let err = Credentials::resolve_with(&config, env(&[("OPENAI_API_KEY", "o-key")]))
            .unwrap_err();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }

    #[test]
    fn test_missing_embedding_key_halts() {
        let config = AppConfig::default();
        let err = Credentials::resolve_with(&config, env(&[("GOOGLE_API_KEY", "g-key")]))
            .unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let config = AppConfig::default();
        let result = Credentials::resolve_with(
            &config,
            env(&[("GOOGLE_API_KEY", "  "), ("OPENAI_API_KEY", "o-key")]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let mut config = AppConfig::default();
        config.api_key = Some("explicit".to_string());
        let creds = Credentials::resolve_with(
            &config,
            env(&[("GOOGLE_API_KEY", "g-key"), ("OPENAI_API_KEY", "o-key")]),
        )
        .unwrap();
        assert_eq!(creds.model_api_key.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_keyless_providers() {
        let mut config = AppConfig::default();
        config.provider = "ollama".to_string();
        config.embedding.provider = "mock".to_string();

        let creds = Credentials::resolve_with(&config, env(&[])).unwrap();
        assert!(creds.model_api_key.is_none());
        assert!(creds.embedding_api_key.is_none());
    }

    #[test]
    fn test_debug_redacts_keys() {
        let creds = Credentials {
            model_api_key: Some("secret".to_string()),
            embedding_api_key: None,
        };
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
