//! The five orchestration roles and their static configuration.

use crag_core::{AppConfig, AppError, AppResult};
use crag_knowledge::KnowledgeBinding;
use crag_prompt::{build_prompt, builtin_prompt, load_prompt, BuiltPrompt, PromptDefinition};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Added to the system prompt of roles with the reasoning tool.
const REASONING_INSTRUCTIONS: &str = "Think through the question step by step before answering. \
Check every step against the provided context and revise the answer if a step is not supported.";

/// Added to the system prompt of roles that render markdown.
const MARKDOWN_INSTRUCTIONS: &str = "Use markdown to format your answers.";

/// Added to the system prompt of knowledge-bound roles.
const KNOWLEDGE_INSTRUCTIONS: &str =
    "Knowledge base results for the query are included below the request.";

/// Identity of an orchestration role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleId {
    Planner,
    Retriever,
    Reasoner,
    Verifier,
    Reflector,
}

impl RoleId {
    /// All roles, in pipeline order.
    pub const ALL: [RoleId; 5] = [
        RoleId::Planner,
        RoleId::Retriever,
        RoleId::Reasoner,
        RoleId::Verifier,
        RoleId::Reflector,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleId::Planner => "planner",
            RoleId::Retriever => "retriever",
            RoleId::Reasoner => "reasoner",
            RoleId::Verifier => "verifier",
            RoleId::Reflector => "reflector",
        }
    }

    /// Only the retriever searches the knowledge store.
    pub fn binds_knowledge(&self) -> bool {
        matches!(self, RoleId::Retriever)
    }

    /// Tools the role is augmented with.
    pub fn tools(&self) -> Vec<RoleTool> {
        match self {
            RoleId::Reasoner => vec![RoleTool::Reasoning],
            _ => Vec::new(),
        }
    }

    /// Only the reasoner renders rich text.
    pub fn renders_markdown(&self) -> bool {
        matches!(self, RoleId::Reasoner)
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoleId::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::Orchestration(format!("Unknown role: {}", s)))
    }
}

/// Tool augmentation available to a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleTool {
    /// Step-by-step reasoning instructions
    Reasoning,
}

impl RoleTool {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleTool::Reasoning => "reasoning",
        }
    }
}

/// Prompt definitions for every role.
#[derive(Debug, Clone)]
pub struct RolePrompts {
    definitions: HashMap<RoleId, PromptDefinition>,
}

impl RolePrompts {
    /// Load prompts, honoring workspace overrides under `.crag/prompts/`.
    pub fn load(workspace: &Path) -> AppResult<Self> {
        Self::collect(|role| load_prompt(workspace, role.as_str()))
    }

    /// The compiled-in prompts.
    pub fn builtin() -> AppResult<Self> {
        Self::collect(|role| builtin_prompt(role.as_str()))
    }

    fn collect<F>(load: F) -> AppResult<Self>
    where
        F: Fn(RoleId) -> AppResult<PromptDefinition>,
    {
        let definitions = RoleId::ALL
            .into_iter()
            .map(|role| load(role).map(|def| (role, def)))
            .collect::<AppResult<HashMap<_, _>>>()?;
        Ok(Self { definitions })
    }

    pub fn get(&self, role: RoleId) -> AppResult<&PromptDefinition> {
        self.definitions
            .get(&role)
            .ok_or_else(|| AppError::Prompt(format!("No prompt for role {}", role)))
    }

    /// Render a role's message template.
    pub fn render(&self, role: RoleId, variables: &[(&str, String)]) -> AppResult<BuiltPrompt> {
        let variables = variables
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        build_prompt(self.get(role)?, variables)
    }
}

/// Static configuration of one role, fixed at startup.
#[derive(Clone)]
pub struct RoleConfig {
    pub role: RoleId,
    pub model: String,
    pub instructions: Vec<String>,
    pub tools: Vec<RoleTool>,
    pub knowledge: Option<Arc<dyn KnowledgeBinding>>,
    pub markdown: bool,
}

impl fmt::Debug for RoleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleConfig")
            .field("role", &self.role)
            .field("model", &self.model)
            .field("instructions", &self.instructions)
            .field("tools", &self.tools)
            .field("knowledge", &self.knowledge.is_some())
            .field("markdown", &self.markdown)
            .finish()
    }
}

impl RoleConfig {
    /// System prompt: the instruction list plus tool, knowledge and
    /// formatting additions.
    pub fn system_prompt(&self) -> String {
        let mut lines = self.instructions.clone();
        if self.tools.contains(&RoleTool::Reasoning) {
            lines.push(REASONING_INSTRUCTIONS.to_string());
        }
        if self.knowledge.is_some() {
            lines.push(KNOWLEDGE_INSTRUCTIONS.to_string());
        }
        if self.markdown {
            lines.push(MARKDOWN_INSTRUCTIONS.to_string());
        }
        lines.join("\n")
    }
}

/// Build the configuration of all five roles.
///
/// `knowledge` is bound to the retriever only.
pub fn build_role_configs(
    config: &AppConfig,
    prompts: &RolePrompts,
    knowledge: Option<Arc<dyn KnowledgeBinding>>,
) -> AppResult<Vec<RoleConfig>> {
    RoleId::ALL
        .into_iter()
        .map(|role| {
            Ok(RoleConfig {
                role,
                model: config.role_model(role.as_str()).to_string(),
                instructions: prompts.get(role)?.instructions.clone(),
                tools: role.tools(),
                knowledge: if role.binds_knowledge() {
                    knowledge.clone()
                } else {
                    None
                },
                markdown: role.renders_markdown(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crag_core::config::RoleSettings;
    use crag_knowledge::SearchHit;

    struct NoKnowledge;

    #[async_trait::async_trait]
    impl KnowledgeBinding for NoKnowledge {
        async fn search(&self, _query: &str, _k: usize) -> AppResult<Vec<SearchHit>> {
            Ok(Vec::new())
        }
    }

    fn configs() -> Vec<RoleConfig> {
        let mut config = AppConfig::default();
        config.roles.insert(
            "verifier".to_string(),
            RoleSettings {
                model: Some("gemini-2.5-pro".to_string()),
            },
        );
        let prompts = RolePrompts::builtin().unwrap();
        build_role_configs(&config, &prompts, Some(Arc::new(NoKnowledge))).unwrap()
    }

    #[test]
    fn test_role_id_round_trip() {
        for role in RoleId::ALL {
            assert_eq!(role.as_str().parse::<RoleId>().unwrap(), role);
        }
        assert_eq!(" Planner ".parse::<RoleId>().unwrap(), RoleId::Planner);
        assert!("summarizer".parse::<RoleId>().is_err());
    }

    #[test]
    fn test_only_retriever_is_knowledge_bound() {
        for config in configs() {
            assert_eq!(config.knowledge.is_some(), config.role == RoleId::Retriever);
        }
    }

    #[test]
    fn test_only_reasoner_has_tools_and_markdown() {
        for config in configs() {
            let is_reasoner = config.role == RoleId::Reasoner;
            assert_eq!(config.markdown, is_reasoner);
            assert_eq!(config.tools.contains(&RoleTool::Reasoning), is_reasoner);
        }
    }

    #[test]
    fn test_models_default_and_override() {
        for config in configs() {
            let expected = if config.role == RoleId::Verifier {
                "gemini-2.5-pro"
            } else {
                "gemini-2.5-flash"
            };
            assert_eq!(config.model, expected, "role {}", config.role);
        }
    }

    #[test]
    fn test_system_prompts() {
        let configs = configs();
        let by_role = |role: RoleId| configs.iter().find(|c| c.role == role).unwrap();

        assert_eq!(
            by_role(RoleId::Planner).system_prompt(),
            "Return ONLY valid JSON.\nSchema: {need_retrieval: bool, k: int, focus: string}"
        );

        let reasoner = by_role(RoleId::Reasoner).system_prompt();
        assert!(reasoner.starts_with("Answer ONLY using provided context.\nCite sources."));
        assert!(reasoner.contains(REASONING_INSTRUCTIONS));
        assert!(reasoner.ends_with(MARKDOWN_INSTRUCTIONS));

        assert!(by_role(RoleId::Retriever)
            .system_prompt()
            .contains(KNOWLEDGE_INSTRUCTIONS));
    }

    #[test]
    fn test_render_retriever_prompt() {
        let prompts = RolePrompts::builtin().unwrap();
        let built = prompts
            .render(
                RoleId::Retriever,
                &[
                    ("k", "4".to_string()),
                    ("query", "Q".to_string()),
                    ("focus", String::new()),
                ],
            )
            .unwrap();
        assert_eq!(built.user, "Retrieve top 4 documents.\nQuery: Q\nFocus: ");
    }
}
