//! Prompt loader for role prompt definitions.
//!
//! Every role ships with a built-in definition. A workspace may override any
//! of them with `.crag/prompts/<role>.yml`.

use crate::types::PromptDefinition;
use crag_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

const BUILTIN_PROMPTS: &[(&str, &str)] = &[
    ("planner", include_str!("../prompts/planner.yml")),
    ("retriever", include_str!("../prompts/retriever.yml")),
    ("reasoner", include_str!("../prompts/reasoner.yml")),
    ("verifier", include_str!("../prompts/verifier.yml")),
    ("reflector", include_str!("../prompts/reflector.yml")),
];

/// Directory holding workspace prompt overrides.
pub fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(".crag").join("prompts")
}

/// Load the prompt definition for a role.
///
/// Uses `.crag/prompts/<prompt_id>.yml` when present, the built-in
/// definition otherwise.
///
/// # Example
/// ```no_run
/// use crag_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "planner")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir(workspace_path).join(format!("{}.yml", prompt_id));

    let definition = if prompt_file.exists() {
        tracing::debug!("Loading prompt override from: {:?}", prompt_file);

        let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to read prompt file {:?}: {}",
                prompt_file, e
            ))
        })?;

        serde_yaml::from_str::<PromptDefinition>(&contents).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to parse prompt YAML {:?}: {}",
                prompt_file, e
            ))
        })?
    } else {
        builtin_prompt(prompt_id)?
    };

    validate_prompt(&definition, prompt_id)?;

    tracing::debug!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// Parse the built-in definition for a role.
pub fn builtin_prompt(prompt_id: &str) -> AppResult<PromptDefinition> {
    let (_, yaml) = BUILTIN_PROMPTS
        .iter()
        .find(|(id, _)| *id == prompt_id)
        .ok_or_else(|| AppError::Prompt(format!("No built-in prompt for '{}'", prompt_id)))?;

    serde_yaml::from_str(yaml).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse built-in prompt '{}': {}",
            prompt_id, e
        ))
    })
}

/// List the prompt IDs overridden in the workspace.
pub fn list_overrides(workspace_path: &Path) -> AppResult<Vec<String>> {
    let dir = prompts_dir(workspace_path);

    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut prompt_ids = Vec::new();

    for entry in walkdir::WalkDir::new(&dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                prompt_ids.push(stem.to_string());
            }
        }
    }

    prompt_ids.sort();
    Ok(prompt_ids)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition, expected_id: &str) -> AppResult<()> {
    if def.id != expected_id {
        return Err(AppError::Prompt(format!(
            "Prompt id '{}' does not match requested '{}'",
            def.id, expected_id
        )));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_override(dir: &Path, id: &str, content: &str) {
        let prompts = prompts_dir(dir);
        fs::create_dir_all(&prompts).unwrap();
        fs::write(prompts.join(format!("{}.yml", id)), content).unwrap();
    }

    #[test]
    fn test_all_builtins_parse() {
        for role in ["planner", "retriever", "reasoner", "verifier", "reflector"] {
            let def = builtin_prompt(role).unwrap();
            assert_eq!(def.id, role);
            assert!(!def.instructions.is_empty());
        }
    }

    #[test]
    fn test_load_falls_back_to_builtin() {
        let temp_dir = TempDir::new().unwrap();
        let def = load_prompt(temp_dir.path(), "planner").unwrap();
        assert_eq!(def.template, "{{query}}");
        assert!(def.output.is_json());
    }

    #[test]
    fn test_workspace_override_wins() {
        let temp_dir = TempDir::new().unwrap();
        write_override(
            temp_dir.path(),
            "reasoner",
            r#"
id: reasoner
title: "Terse reasoner"
apiVersion: "1.1"
instructions: ["Answer in one sentence."]
template: "Q: {{query}} C: {{context}}"
output:
  format: text
"#,
        );

        let def = load_prompt(temp_dir.path(), "reasoner").unwrap();
        assert_eq!(def.title, "Terse reasoner");
        assert_eq!(def.instructions, vec!["Answer in one sentence."]);
    }

    #[test]
    fn test_override_with_wrong_id_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_override(
            temp_dir.path(),
            "verifier",
            r#"
id: reflector
title: "Mislabelled"
apiVersion: "1.0"
template: "{{answer}}"
output:
  format: json
"#,
        );

        assert!(load_prompt(temp_dir.path(), "verifier").is_err());
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        write_override(temp_dir.path(), "planner", "invalid: yaml: content:");
        assert!(load_prompt(temp_dir.path(), "planner").is_err());
    }

    #[test]
    fn test_unknown_builtin() {
        assert!(builtin_prompt("summarizer").is_err());
    }

    #[test]
    fn test_list_overrides() {
        let temp_dir = TempDir::new().unwrap();
        assert!(list_overrides(temp_dir.path()).unwrap().is_empty());

        write_override(temp_dir.path(), "verifier", "id: verifier");
        write_override(temp_dir.path(), "planner", "id: planner");

        assert_eq!(
            list_overrides(temp_dir.path()).unwrap(),
            vec!["planner".to_string(), "verifier".to_string()]
        );
    }
}
