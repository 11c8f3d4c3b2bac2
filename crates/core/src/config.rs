//! Configuration management for crag.
//!
//! Configuration is merged from, in increasing precedence:
//! - Built-in defaults
//! - `.env` in the current directory (via `dotenvy`, never overriding the process env)
//! - Config file (`.crag/config.yaml` or `CRAG_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric: the knowledge store, the source
//! registry and prompt overrides all live under `<workspace>/.crag/` unless an
//! absolute location is configured.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Default model used by every role unless overridden.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Source registered on first run when the registry is empty.
pub const DEFAULT_SOURCE_URL: &str =
    "https://www.theunwindai.com/p/mcp-vs-a2a-complementing-or-supplementing";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .crag/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Active LLM provider ("gemini" or "ollama")
    pub provider: String,

    /// Default model identifier for all roles
    pub model: String,

    /// Explicit model-provider API key (`CRAG_API_KEY`), wins over `apiKeyEnv`
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub log_json: bool,

    /// LLM provider configurations
    pub llm: LlmConfig,

    /// Embedding provider configuration
    pub embedding: EmbeddingSettings,

    /// Knowledge store configuration
    pub knowledge: KnowledgeSettings,

    /// Per-role overrides keyed by role name ("planner", "reasoner", ...)
    pub roles: HashMap<String, RoleSettings>,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    pub active_provider: String,

    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

/// Settings for one model provider, keyed by provider name in [`LlmConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,

    /// Model identifier for this provider
    pub model: Option<String>,

    /// Custom endpoint URL
    pub endpoint: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingSettings {
    /// Provider name: "openai" or "mock"
    pub provider: String,

    /// Embedding model identifier
    pub model: String,

    /// Vector dimensions produced by the model
    pub dimensions: usize,

    /// Environment variable holding the embedding API key
    pub api_key_env: String,

    /// Custom endpoint URL
    pub endpoint: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            api_key_env: "OPENAI_API_KEY".to_string(),
            endpoint: None,
        }
    }
}

/// Knowledge store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KnowledgeSettings {
    /// LanceDB directory; relative paths resolve against the workspace
    pub uri: String,

    /// LanceDB table holding the chunks
    pub table_name: String,

    /// Target chunk size in characters
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,

    /// Sources registered when the registry is empty
    pub default_sources: Vec<String>,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self {
            uri: "tmp/lancedb".to_string(),
            table_name: "elite_rag_docs".to_string(),
            chunk_size: 1000,
            chunk_overlap: 100,
            default_sources: vec![DEFAULT_SOURCE_URL.to_string()],
        }
    }
}

/// Per-role overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleSettings {
    /// Model identifier for this role
    pub model: Option<String>,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    embedding: Option<EmbeddingSettings>,
    knowledge: Option<KnowledgeSettings>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    #[serde(default)]
    roles: HashMap<String, RoleSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let mut providers = HashMap::new();

        providers.insert(
            "gemini".to_string(),
            ProviderConfig {
                api_key_env: Some("GOOGLE_API_KEY".to_string()),
                model: Some(DEFAULT_MODEL.to_string()),
                endpoint: None,
                timeout_secs: Some(120),
            },
        );

        providers.insert(
            "ollama".to_string(),
            ProviderConfig {
                api_key_env: None,
                model: Some("llama3.2".to_string()),
                endpoint: Some("http://localhost:11434".to_string()),
                timeout_secs: Some(300),
            },
        );

        Self {
            active_provider: "gemini".to_string(),
            providers,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "gemini".to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            log_json: false,
            llm: LlmConfig::default(),
            embedding: EmbeddingSettings::default(),
            knowledge: KnowledgeSettings::default(),
            roles: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `.env`, the config file and environment variables.
    ///
    /// Environment variables:
    /// - `CRAG_WORKSPACE`: Override workspace path
    /// - `CRAG_CONFIG`: Path to config file
    /// - `CRAG_PROVIDER`: LLM provider
    /// - `CRAG_MODEL`: Default model identifier
    /// - `CRAG_API_KEY`: Model-provider API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use crag_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], but `workspace` and `config_file` (usually
    /// CLI flags) win over `CRAG_WORKSPACE` and `CRAG_CONFIG`, so the file
    /// they point at is the one merged.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        // A missing .env is the normal case.
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {:?}", path);
        }

        let mut config = Self::default();

        if let Some(workspace) = workspace.or_else(|| std::env::var("CRAG_WORKSPACE").ok().map(PathBuf::from)) {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var("CRAG_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.crag_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("CRAG_PROVIDER") {
            config.provider = provider;
            config.use_provider_model();
        }

        if let Ok(model) = std::env::var("CRAG_MODEL") {
            config.model = model;
        }

        config.api_key = std::env::var("CRAG_API_KEY").ok();

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(mut self, contents: &str) -> Result<Self, serde_yaml::Error> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                self.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
            if let Some(json) = logging.json {
                self.log_json = json;
            }
        }

        if let Some(llm) = config_file.llm {
            self.provider = llm.active_provider.clone();

            if let Some(model) = llm
                .providers
                .get(&llm.active_provider)
                .and_then(|pc| pc.model.clone())
            {
                self.model = model;
            }

            // Keep built-in provider entries the file does not mention.
            let mut providers = std::mem::take(&mut self.llm.providers);
            providers.extend(llm.providers);
            self.llm = LlmConfig {
                active_provider: llm.active_provider,
                providers,
            };
        }

        if let Some(embedding) = config_file.embedding {
            self.embedding = embedding;
        }

        if let Some(knowledge) = config_file.knowledge {
            self.knowledge = knowledge;
        }

        self.roles.extend(config_file.roles);

        Ok(self)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
            if model.is_none() {
                self.use_provider_model();
            }
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Switch the default model to the active provider's configured model.
    fn use_provider_model(&mut self) {
        if let Some(model) = self
            .get_provider_config(&self.provider)
            .and_then(|pc| pc.model.clone())
        {
            self.model = model;
        }
    }

    /// Get the path to the .crag directory.
    pub fn crag_dir(&self) -> PathBuf {
        self.workspace.join(".crag")
    }

    /// Ensure the .crag directory exists.
    pub fn ensure_crag_dir(&self) -> AppResult<()> {
        let crag_dir = self.crag_dir();
        if !crag_dir.exists() {
            std::fs::create_dir_all(&crag_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .crag directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Path of the knowledge source registry file.
    pub fn sources_path(&self) -> PathBuf {
        self.crag_dir().join("sources.jsonl")
    }

    /// Resolved LanceDB location (relative URIs are workspace-relative).
    pub fn knowledge_uri(&self) -> PathBuf {
        let uri = Path::new(&self.knowledge.uri);
        if uri.is_absolute() {
            uri.to_path_buf()
        } else {
            self.workspace.join(uri)
        }
    }

    /// Get the configuration of a provider.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.providers.get(provider)
    }

    /// Model used for a role: role override, then the default model.
    pub fn role_model(&self, role: &str) -> &str {
        self.roles
            .get(role)
            .and_then(|r| r.model.as_deref())
            .unwrap_or(&self.model)
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let known_providers = ["gemini", "ollama"];
        if !known_providers.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                known_providers.join(", ")
            )));
        }

        let known_embedders = ["openai", "mock"];
        if !known_embedders.contains(&self.embedding.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding.provider,
                known_embedders.join(", ")
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }

        if self.knowledge.chunk_overlap >= self.knowledge.chunk_size {
            return Err(AppError::Config(format!(
                "Chunk overlap ({}) must be smaller than chunk size ({})",
                self.knowledge.chunk_overlap, self.knowledge.chunk_size
            )));
        }

        Ok(())
    }
}
