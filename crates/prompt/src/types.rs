//! Prompt types for crag role prompts.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A role prompt definition loaded from YAML.
///
/// The instruction list becomes the system prompt; the template renders the
/// per-call user message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Prompt identifier, equal to the role name ("planner", "retriever", ...)
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Fixed instructions sent as the system prompt
    #[serde(default)]
    pub instructions: Vec<String>,

    /// Template string with Handlebars syntax
    pub template: String,

    /// Expected output format
    pub output: PromptOutputSpec,
}

/// Expected output format of a prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptOutputSpec {
    /// Output format ("json", "text", "markdown")
    pub format: String,
}

impl PromptOutputSpec {
    /// Whether the role is expected to emit a JSON record.
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message (optional)
    pub system: Option<String>,

    /// User message (required)
    pub user: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    /// Source prompt ID
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Template variables that were resolved
    #[serde(rename = "resolvedVariables")]
    pub resolved_variables: HashMap<String, String>,
}

impl BuiltPrompt {
    /// Create a new built prompt.
    pub fn new(
        system: Option<String>,
        user: String,
        source_prompt_id: String,
        resolved_variables: HashMap<String, String>,
    ) -> Self {
        Self {
            system,
            user,
            metadata: BuiltPromptMetadata {
                source_prompt_id,
                resolved_variables,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_definition_deserialization() {
        let yaml = r#"
id: verifier
title: Answer verifier
apiVersion: "1.0"
instructions:
  - "Return JSON only."
template: "{{answer}}"
output:
  format: JSON
"#;

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.id, "verifier");
        assert_eq!(def.instructions, vec!["Return JSON only."]);
        assert!(def.output.is_json());
    }

    #[test]
    fn test_instructions_default_to_empty() {
        let yaml = r#"
id: planner
title: Planner
apiVersion: "1.0"
template: "{{query}}"
output:
  format: text
"#;

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert!(def.instructions.is_empty());
        assert!(!def.output.is_json());
    }
}
