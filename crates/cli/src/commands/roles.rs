//! Roles command handler.
//!
//! Prints the static configuration of the five roles.

use clap::Args;
use crag_agents::{build_role_configs, RoleConfig, RolePrompts};
use crag_core::{config::AppConfig, AppResult};
use crag_prompt::{list_overrides, PromptOutputSpec};
use serde_json::json;

/// Show role configuration
#[derive(Args, Debug)]
pub struct RolesCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RolesCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let prompts = RolePrompts::load(&config.workspace)?;
        let overrides = list_overrides(&config.workspace)?;

        // No store is opened here.
        let roles = build_role_configs(config, &prompts, None)?;

        if self.json {
            let rows: Vec<serde_json::Value> = roles
                .iter()
                .map(|role| -> AppResult<serde_json::Value> {
                    let output = &prompts.get(role.role)?.output;
                    Ok(json!({
                        "role": role.role,
                        "model": role.model,
                        "instructions": role.instructions,
                        "tools": role.tools,
                        "knowledge": role.role.binds_knowledge(),
                        "markdown": role.markdown,
                        "output": output.format,
                        "structured": output.is_json(),
                        "promptOverride": overrides.iter().any(|id| id == role.role.as_str()),
                    }))
                })
                .collect::<AppResult<_>>()?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
            return Ok(());
        }

        for role in &roles {
            let overridden = overrides.iter().any(|id| id == role.role.as_str());
            println!("{}", describe(role, &prompts.get(role.role)?.output, overridden));
        }
        Ok(())
    }
}

fn describe(role: &RoleConfig, output: &PromptOutputSpec, overridden: bool) -> String {
    let tools = if role.tools.is_empty() {
        "none".to_string()
    } else {
        role.tools
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut out = format!(
        "{}\n  model: {}\n  tools: {}\n  knowledge: {}\n  markdown: {}",
        role.role,
        role.model,
        tools,
        if role.role.binds_knowledge() { "bound" } else { "none" },
        role.markdown
    );
    out.push_str(&format!(
        "\n  output: {}{}",
        output.format,
        if output.is_json() { " (structured)" } else { "" }
    ));
    if overridden {
        out.push_str("\n  prompt: workspace override");
    }
    out.push_str("\n  instructions:");
    for line in &role.instructions {
        out.push_str(&format!("\n    - {}", line));
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crag_agents::RoleId;

    #[test]
    fn test_describe_reasoner() {
        let prompts = RolePrompts::builtin().unwrap();
        let roles = build_role_configs(&AppConfig::default(), &prompts, None).unwrap();
        let reasoner = roles.iter().find(|r| r.role == RoleId::Reasoner).unwrap();

        let text = describe(reasoner, &prompts.get(RoleId::Reasoner).unwrap().output, false);
        assert!(text.starts_with("reasoner\n  model: gemini-2.5-flash"));
        assert!(text.contains("tools: reasoning"));
        assert!(text.contains("knowledge: none"));
        assert!(text.contains("markdown: true"));
        assert!(text.contains("output: markdown\n"));
        assert!(text.contains("    - Answer ONLY using provided context."));
        assert!(!text.contains("override"));
    }

    #[test]
    fn test_describe_verifier_is_structured() {
        let prompts = RolePrompts::builtin().unwrap();
        let roles = build_role_configs(&AppConfig::default(), &prompts, None).unwrap();
        let verifier = roles.iter().find(|r| r.role == RoleId::Verifier).unwrap();

        let text = describe(verifier, &prompts.get(RoleId::Verifier).unwrap().output, false);
        assert!(text.contains("output: json (structured)"));
        assert!(text.contains("tools: none"));
    }

    #[test]
    fn test_describe_retriever_is_bound() {
        let prompts = RolePrompts::builtin().unwrap();
        let roles = build_role_configs(&AppConfig::default(), &prompts, None).unwrap();
        let retriever = roles.iter().find(|r| r.role == RoleId::Retriever).unwrap();

        let text = describe(retriever, &prompts.get(RoleId::Retriever).unwrap().output, true);
        assert!(text.contains("knowledge: bound"));
        assert!(text.contains("prompt: workspace override"));
    }
}
