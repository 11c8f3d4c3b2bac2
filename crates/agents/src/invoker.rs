//! Uniform invocation of a configured role.

use crate::roles::{RoleConfig, RoleId};
use crate::types::DEFAULT_TOP_K;
use crag_core::{AppError, AppResult};
use crag_knowledge::{citations_from_hits, Citation, SearchHit};
use crag_llm::{LlmClient, LlmRequest};
use std::collections::HashMap;
use std::sync::Arc;

/// What a knowledge-bound role should search for.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalRequest {
    pub query: String,
    pub top_k: usize,
}

/// A single call to a role.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleRequest {
    /// Rendered user message
    pub prompt: String,

    /// Search parameters, used only by knowledge-bound roles
    pub retrieval: Option<RetrievalRequest>,
}

impl RoleRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            retrieval: None,
        }
    }

    pub fn with_retrieval(mut self, query: impl Into<String>, top_k: usize) -> Self {
        self.retrieval = Some(RetrievalRequest {
            query: query.into(),
            top_k,
        });
        self
    }
}

/// A role's reply.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoleResponse {
    pub content: String,

    /// Sources behind the reply; only knowledge-bound roles set this
    pub citations: Option<Vec<Citation>>,
}

impl RoleResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            citations: None,
        }
    }

    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = Some(citations);
        self
    }
}

/// Invokes roles by identity. The call completes before it returns; errors
/// propagate unchanged.
#[async_trait::async_trait]
pub trait RoleInvoker: Send + Sync {
    async fn invoke(&self, role: RoleId, request: RoleRequest) -> AppResult<RoleResponse>;
}

/// [`RoleInvoker`] backed by an LLM client.
pub struct LlmRoleInvoker {
    client: Arc<dyn LlmClient>,
    roles: HashMap<RoleId, RoleConfig>,
}

impl LlmRoleInvoker {
    pub fn new(client: Arc<dyn LlmClient>, roles: Vec<RoleConfig>) -> Self {
        Self {
            client,
            roles: roles.into_iter().map(|r| (r.role, r)).collect(),
        }
    }
}

#[async_trait::async_trait]
impl RoleInvoker for LlmRoleInvoker {
    async fn invoke(&self, role: RoleId, request: RoleRequest) -> AppResult<RoleResponse> {
        let config = self
            .roles
            .get(&role)
            .ok_or_else(|| AppError::Orchestration(format!("Role {} is not configured", role)))?;

        let mut prompt = request.prompt;
        let mut citations = None;

        if let Some(knowledge) = &config.knowledge {
            let retrieval = request.retrieval.unwrap_or_else(|| RetrievalRequest {
                query: prompt.clone(),
                top_k: DEFAULT_TOP_K,
            });

            let hits = knowledge.search(&retrieval.query, retrieval.top_k).await?;
            tracing::debug!(role = %role, hits = hits.len(), "Knowledge search complete");

            prompt = format!("{}\n\n{}", prompt, format_hits(&hits));
            citations = Some(citations_from_hits(&hits));
        }

        let llm_request = LlmRequest::new(prompt, config.model.clone())
            .with_system(config.system_prompt());

        tracing::debug!(
            role = %role,
            model = %config.model,
            prompt_len = llm_request.prompt.len(),
            "Invoking role"
        );

        let response = self.client.complete(&llm_request).await?;

        tracing::debug!(
            role = %role,
            response_len = response.content.len(),
            "Role responded"
        );

        Ok(RoleResponse {
            content: response.content,
            citations,
        })
    }
}

/// Numbered context block handed to a knowledge-bound role.
fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "Knowledge base results: none found.".to_string();
    }

    let mut out = String::from("Knowledge base results:");
    for (i, hit) in hits.iter().enumerate() {
        let label = hit.chunk.title.as_deref().unwrap_or(&hit.chunk.uri);
        out.push_str(&format!(
            "\n\n[{}] {} ({})\n{}",
            i + 1,
            label,
            hit.chunk.uri,
            hit.chunk.text.trim()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::{build_role_configs, RolePrompts};
    use crag_core::AppConfig;
    use crag_knowledge::{KnowledgeBinding, KnowledgeChunk};
    use crag_llm::{LlmResponse, LlmUsage};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        requests: Mutex<Vec<LlmRequest>>,
    }

    #[async_trait::async_trait]
    impl LlmClient for RecordingClient {
        fn provider_name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(LlmResponse {
                content: format!("reply from {}", request.model),
                model: request.model.clone(),
                usage: LlmUsage::default(),
            })
        }
    }

    struct FailingClient;

    #[async_trait::async_trait]
    impl LlmClient for FailingClient {
        fn provider_name(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _request: &LlmRequest) -> AppResult<LlmResponse> {
            Err(AppError::Llm("503 Service Unavailable".to_string()))
        }
    }

    #[derive(Default)]
    struct FakeKnowledge {
        searches: Mutex<Vec<(String, usize)>>,
    }

    fn hit(uri: &str, title: Option<&str>, text: &str) -> SearchHit {
        SearchHit {
            chunk: KnowledgeChunk {
                id: text.to_string(),
                source_id: "id".to_string(),
                uri: uri.to_string(),
                title: title.map(str::to_string),
                position: 0,
                text: text.to_string(),
                embedding: None,
            },
            score: 0.5,
        }
    }

    #[async_trait::async_trait]
    impl KnowledgeBinding for FakeKnowledge {
        async fn search(&self, query: &str, k: usize) -> AppResult<Vec<SearchHit>> {
            self.searches.lock().unwrap().push((query.to_string(), k));
            Ok(vec![
                hit("https://a.example/mcp", Some("MCP"), "MCP connects tools."),
                hit("https://b.example/a2a", None, "A2A connects agents."),
                hit("https://a.example/mcp", Some("MCP"), "More on MCP."),
            ])
        }
    }

    struct BrokenKnowledge;

    #[async_trait::async_trait]
    impl KnowledgeBinding for BrokenKnowledge {
        async fn search(&self, _query: &str, _k: usize) -> AppResult<Vec<SearchHit>> {
            Err(AppError::Knowledge("table missing".to_string()))
        }
    }

    fn invoker(
        client: Arc<dyn LlmClient>,
        knowledge: Arc<dyn KnowledgeBinding>,
    ) -> LlmRoleInvoker {
        let prompts = RolePrompts::builtin().unwrap();
        let roles = build_role_configs(&AppConfig::default(), &prompts, Some(knowledge)).unwrap();
        LlmRoleInvoker::new(client, roles)
    }

    #[tokio::test]
    async fn test_plain_role_has_no_citations() {
        let client = Arc::new(RecordingClient::default());
        let knowledge = Arc::new(FakeKnowledge::default());
        let invoker = invoker(client.clone(), knowledge.clone());

        let response = invoker
            .invoke(RoleId::Planner, RoleRequest::new("What is MCP?"))
            .await
            .unwrap();

        assert_eq!(response.content, "reply from gemini-2.5-flash");
        assert!(response.citations.is_none());
        assert!(knowledge.searches.lock().unwrap().is_empty());

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests[0].prompt, "What is MCP?");
        assert!(requests[0]
            .system
            .as_deref()
            .unwrap()
            .starts_with("Return ONLY valid JSON."));
    }

    #[tokio::test]
    async fn test_retriever_searches_and_cites_distinct_sources() {
        let client = Arc::new(RecordingClient::default());
        let knowledge = Arc::new(FakeKnowledge::default());
        let invoker = invoker(client.clone(), knowledge.clone());

        let response = invoker
            .invoke(
                RoleId::Retriever,
                RoleRequest::new("Retrieve top 3 documents.").with_retrieval("MCP vs A2A", 3),
            )
            .await
            .unwrap();

        assert_eq!(
            *knowledge.searches.lock().unwrap(),
            vec![("MCP vs A2A".to_string(), 3)]
        );
        assert_eq!(
            response.citations.unwrap(),
            vec![
                Citation::new("https://a.example/mcp", Some("MCP".to_string())),
                Citation::new("https://b.example/a2a", None),
            ]
        );

        let prompt = &client.requests.lock().unwrap()[0].prompt;
        assert!(prompt.starts_with("Retrieve top 3 documents.\n\nKnowledge base results:"));
        assert!(prompt.contains("[1] MCP (https://a.example/mcp)\nMCP connects tools."));
        assert!(prompt.contains("[2] https://b.example/a2a (https://b.example/a2a)"));
    }

    #[tokio::test]
    async fn test_retriever_without_retrieval_request_searches_prompt() {
        let client = Arc::new(RecordingClient::default());
        let knowledge = Arc::new(FakeKnowledge::default());
        let invoker = invoker(client, knowledge.clone());

        invoker
            .invoke(RoleId::Retriever, RoleRequest::new("raw prompt"))
            .await
            .unwrap();

        assert_eq!(
            *knowledge.searches.lock().unwrap(),
            vec![("raw prompt".to_string(), DEFAULT_TOP_K)]
        );
    }

    #[tokio::test]
    async fn test_reasoner_system_prompt_has_reasoning_and_markdown() {
        let client = Arc::new(RecordingClient::default());
        let invoker = invoker(client.clone(), Arc::new(FakeKnowledge::default()));

        invoker
            .invoke(RoleId::Reasoner, RoleRequest::new("Question:\nQ\n\nContext:\n"))
            .await
            .unwrap();

        let system = client.requests.lock().unwrap()[0].system.clone().unwrap();
        assert!(system.contains("step by step"));
        assert!(system.contains("markdown"));
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let invoker = invoker(Arc::new(FailingClient), Arc::new(FakeKnowledge::default()));
        let err = invoker
            .invoke(RoleId::Verifier, RoleRequest::new("answer"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Llm(_)));
    }

    #[tokio::test]
    async fn test_knowledge_failure_propagates() {
        let client = Arc::new(RecordingClient::default());
        let invoker = invoker(client.clone(), Arc::new(BrokenKnowledge));
        let err = invoker
            .invoke(RoleId::Retriever, RoleRequest::new("p").with_retrieval("q", 4))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Knowledge(_)));
        assert!(client.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_role() {
        let invoker = LlmRoleInvoker::new(Arc::new(RecordingClient::default()), Vec::new());
        let err = invoker
            .invoke(RoleId::Planner, RoleRequest::new("q"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Orchestration(_)));
    }
}
