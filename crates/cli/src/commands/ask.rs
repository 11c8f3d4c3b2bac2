//! Ask command handler.
//!
//! Ingests any pending knowledge sources, then runs the corrective loop for
//! one question and presents the accepted answer or the failure.

use crate::commands::sources::{open_registry, open_store};
use clap::Args;
use crag_agents::{build_role_configs, FinalResult, LlmRoleInvoker, Orchestrator, Outcome, RolePrompts};
use crag_core::{config::AppConfig, AppError, AppResult, Credentials};
use crag_knowledge::KnowledgeBinding;
use crag_llm::create_client;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

/// Question asked when none is given.
pub const DEFAULT_QUERY: &str = "What is the difference between MCP and A2A protocols?";

/// Exit status when no attempt reached a confident answer.
const EXIT_UNANSWERED: u8 = 2;

/// Ask a question against the knowledge base
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub query: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "query")]
    pub file: Option<PathBuf>,

    /// Output the result and attempt trace as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<ExitCode> {
        tracing::info!("Executing ask command");

        let query = self.resolve_query()?;
        tracing::debug!("Query: {}", query);

        // Credentials gate everything else.
        let credentials = Credentials::resolve(config)?;

        let store = open_store(config, &credentials).await?;
        let registry = open_registry(config)?;
        store.load_pending(&registry.uris()).await?;

        let provider_config = config.get_provider_config(&config.provider);
        let endpoint = provider_config.and_then(|pc| pc.endpoint.as_deref());
        let timeout = provider_config
            .and_then(|pc| pc.timeout_secs)
            .map(Duration::from_secs);
        let client = create_client(
            &config.provider,
            endpoint,
            credentials.model_api_key.as_deref(),
            timeout,
        )?;

        let prompts = RolePrompts::load(&config.workspace)?;
        let knowledge: Arc<dyn KnowledgeBinding> = Arc::new(store);
        let roles = build_role_configs(config, &prompts, Some(knowledge))?;
        let invoker = Arc::new(LlmRoleInvoker::new(client, roles));

        let outcome = Orchestrator::new(invoker, prompts).run(&query).await?;

        if self.json {
            let json = serde_json::to_string_pretty(&outcome)?;
            println!("{}", json);
        } else {
            println!("{}", render_result(&outcome.result, outcome.attempts.len()));
        }

        if outcome.result.is_success() {
            Ok(ExitCode::SUCCESS)
        } else {
            log_failure(&outcome);
            Ok(ExitCode::from(EXIT_UNANSWERED))
        }
    }

    fn resolve_query(&self) -> AppResult<String> {
        let query = match (&self.query, &self.file) {
            (Some(query), _) => query.clone(),
            (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
                AppError::Config(format!("Failed to read question file {:?}: {}", path, e))
            })?,
            (None, None) => DEFAULT_QUERY.to_string(),
        };

        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Config("Question is empty".to_string()));
        }
        Ok(query.to_string())
    }
}

fn log_failure(outcome: &Outcome) {
    tracing::debug!(
        attempts = outcome.attempts.len(),
        last_confidence = outcome.result.confidence,
        "No confident answer"
    );
}

/// Human-readable result. A failed result never shows its confidence.
pub fn render_result(result: &FinalResult, attempts: usize) -> String {
    let Some(answer) = &result.answer else {
        return failure_message(attempts);
    };

    let mut out = format!("{}\n\nConfidence: {:.2}", answer.trim_end(), result.confidence);

    if !result.citations.is_empty() {
        out.push_str("\n\nSources:");
        for citation in &result.citations {
            out.push_str(&format!("\n- [{}]({})", citation.label(), citation.url));
        }
    }

    out
}

fn failure_message(attempts: usize) -> String {
    format!("Failed to reach a confident answer after {} attempts", attempts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crag_knowledge::Citation;
    use std::io::Write;

    fn command(query: Option<&str>, file: Option<PathBuf>) -> AskCommand {
        AskCommand {
            query: query.map(str::to_string),
            file,
            json: false,
        }
    }

    #[test]
    fn test_default_query() {
        assert_eq!(command(None, None).resolve_query().unwrap(), DEFAULT_QUERY);
    }

    #[test]
    fn test_query_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  How does A2A discover agents?  ").unwrap();

        let query = command(None, Some(file.path().to_path_buf()))
            .resolve_query()
            .unwrap();
        assert_eq!(query, "How does A2A discover agents?");
    }

    #[test]
    fn test_blank_query_is_rejected() {
        assert!(command(Some("   "), None).resolve_query().is_err());
    }

    #[test]
    fn test_render_accepted_answer() {
        let result = FinalResult {
            answer: Some("MCP links models to tools.\n".to_string()),
            confidence: 0.82,
            citations: vec![
                Citation::new("https://docs.example/mcp", Some("Model Context Protocol".to_string())),
                Citation::new("https://docs.example/a2a", None),
            ],
        };

        assert_eq!(
            render_result(&result, 1),
            "MCP links models to tools.\n\n\
             Confidence: 0.82\n\n\
             Sources:\n\
             - [Model Context Protocol](https://docs.example/mcp)\n\
             - [https://docs.example/a2a](https://docs.example/a2a)"
        );
    }

    #[test]
    fn test_render_answer_without_sources() {
        let result = FinalResult {
            answer: Some("42".to_string()),
            confidence: 1.0,
            citations: Vec::new(),
        };
        assert_eq!(render_result(&result, 1), "42\n\nConfidence: 1.00");
    }

    #[test]
    fn test_render_failure_hides_confidence() {
        let result = FinalResult {
            answer: None,
            confidence: 0.5,
            citations: vec![Citation::new("https://docs.example/mcp", None)],
        };

        let rendered = render_result(&result, 3);
        assert_eq!(rendered, "Failed to reach a confident answer after 3 attempts");
        assert!(!rendered.contains("0.5"));
    }
}
