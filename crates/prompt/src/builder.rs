//! Prompt builder for rendering role templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use crag_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Build a prompt from a definition and input variables.
///
/// The instruction list is joined into the system message; the template is
/// rendered with Handlebars in strict mode, so a variable the template names
/// but the caller did not supply is an error rather than an empty string.
///
/// # Example
/// ```no_run
/// use crag_prompt::{build_prompt, load_prompt};
/// use std::collections::HashMap;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = load_prompt(Path::new("."), "planner")?;
/// let mut vars = HashMap::new();
/// vars.insert("query".to_string(), "What is Rust?".to_string());
///
/// let built = build_prompt(&def, vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::trace!("Building prompt: {}", definition.id);

    let rendered = render_template(&definition.template, &variables)?;

    let system = if definition.instructions.is_empty() {
        None
    } else {
        Some(definition.instructions.join("\n"))
    };

    Ok(BuiltPrompt::new(
        system,
        rendered,
        definition.id.clone(),
        variables,
    ))
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text, never HTML
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.set_strict_mode(true);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::builtin_prompt;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_simple_template() {
        let result = render_template("Question: {{query}}", &vars(&[("query", "Hello, world!")]));
        assert_eq!(result.unwrap(), "Question: Hello, world!");
    }

    #[test]
    fn test_render_does_not_escape_html() {
        let result = render_template("{{answer}}", &vars(&[("answer", "<b>A & B</b>")]));
        assert_eq!(result.unwrap(), "<b>A & B</b>");
    }

    #[test]
    fn test_render_template_missing_variable_is_error() {
        let result = render_template("Question: {{missing}}", &HashMap::new());
        assert!(matches!(result, Err(AppError::Prompt(_))));
    }

    #[test]
    fn test_build_retriever_prompt() {
        let def = builtin_prompt("retriever").unwrap();
        let built = build_prompt(
            &def,
            vars(&[
                ("k", "4"),
                ("query", "What is the difference between MCP and A2A protocols?"),
                ("focus", "protocol comparison"),
            ]),
        )
        .unwrap();

        assert_eq!(
            built.user,
            "Retrieve top 4 documents.\nQuery: What is the difference between MCP and A2A protocols?\nFocus: protocol comparison"
        );
        assert_eq!(
            built.system.as_deref(),
            Some("Retrieve ONLY relevant context.\nDo not answer the question.")
        );
        assert_eq!(built.metadata.source_prompt_id, "retriever");
    }

    #[test]
    fn test_build_reasoner_prompt_with_empty_context() {
        let def = builtin_prompt("reasoner").unwrap();
        let built = build_prompt(&def, vars(&[("query", "Why?"), ("context", "")])).unwrap();
        assert_eq!(built.user, "Question:\nWhy?\n\nContext:\n");
    }

    #[test]
    fn test_build_without_instructions_has_no_system() {
        let mut def = builtin_prompt("verifier").unwrap();
        def.instructions.clear();
        let built = build_prompt(&def, vars(&[("answer", "42")])).unwrap();
        assert!(built.system.is_none());
        assert_eq!(built.user, "42");
    }
}
