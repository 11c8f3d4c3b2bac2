//! The corrective retry loop.
//!
//! One submission runs up to `MAX_RETRIES + 1` attempts. Each attempt walks
//! plan, optional retrieval, reasoning, verification and reflection, in that
//! order, one role call at a time. An attempt ends early when the verifier
//! rejects the answer; the submission ends as soon as a reflection reaches
//! [`CONFIDENCE_THRESHOLD`].

use crate::invoker::{RoleInvoker, RoleRequest};
use crate::parser::parse_record;
use crate::roles::{RoleId, RolePrompts};
use crate::types::{AttemptDecision, AttemptRecord, FinalResult, Plan, Reflection, Verdict};
use crag_core::AppResult;
use crag_knowledge::Citation;
use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;

/// Retries after the first attempt.
pub const MAX_RETRIES: u32 = 2;

/// Minimum reflected confidence for an answer to be accepted.
pub const CONFIDENCE_THRESHOLD: f64 = 0.75;

/// Result of a submission together with its attempt trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub result: FinalResult,
    pub attempts: Vec<AttemptRecord>,
}

/// Position within a single attempt.
enum Step {
    Plan,
    Retrieve {
        plan: Plan,
    },
    Reason {
        plan: Plan,
        retrieved: bool,
        context: String,
    },
    Verify {
        plan: Plan,
        retrieved: bool,
        answer: String,
    },
    Reflect {
        plan: Plan,
        retrieved: bool,
        answer: String,
        verdict: Verdict,
    },
    Done {
        record: AttemptRecord,
        answer: Option<String>,
    },
}

/// State carried across attempts. Only citations and the latest confidence
/// survive an attempt.
#[derive(Default)]
struct Submission {
    citations: Vec<Citation>,
    confidence: f64,
}

/// Drives the five roles through the retry loop.
pub struct Orchestrator {
    invoker: Arc<dyn RoleInvoker>,
    prompts: RolePrompts,
}

impl Orchestrator {
    pub fn new(invoker: Arc<dyn RoleInvoker>, prompts: RolePrompts) -> Self {
        Self { invoker, prompts }
    }

    /// Answer `query`, or report that no attempt reached the threshold.
    ///
    /// Role invocation errors abort the submission.
    pub async fn run(&self, query: &str) -> AppResult<Outcome> {
        let span = tracing::info_span!("submission", query_len = query.len());
        self.run_attempts(query).instrument(span).await
    }

    async fn run_attempts(&self, query: &str) -> AppResult<Outcome> {
        let mut state = Submission::default();
        let mut attempts = Vec::new();

        for attempt in 1..=MAX_RETRIES + 1 {
            let span = tracing::info_span!("attempt", attempt);
            let (record, answer) = self
                .run_attempt(attempt, query, &mut state)
                .instrument(span)
                .await?;
            attempts.push(record);

            if let Some(answer) = answer {
                return Ok(Outcome {
                    result: FinalResult {
                        answer: Some(answer),
                        confidence: state.confidence,
                        citations: state.citations,
                    },
                    attempts,
                });
            }
        }

        tracing::warn!(
            attempts = attempts.len(),
            last_confidence = state.confidence,
            "Retries exhausted without a confident answer"
        );

        Ok(Outcome {
            result: FinalResult {
                answer: None,
                confidence: state.confidence,
                citations: state.citations,
            },
            attempts,
        })
    }

    async fn run_attempt(
        &self,
        attempt: u32,
        query: &str,
        state: &mut Submission,
    ) -> AppResult<(AttemptRecord, Option<String>)> {
        let mut step = Step::Plan;

        loop {
            step = match step {
                Step::Plan => {
                    let prompt = self.prompts.render(RoleId::Planner, &[("query", query.to_string())])?;
                    let response = self.invoker.invoke(RoleId::Planner, RoleRequest::new(prompt.user)).await?;
                    let plan = Plan::from_record(&parse_record(&response.content, Plan::fallback_record()));
                    tracing::debug!(
                        need_retrieval = plan.need_retrieval,
                        k = plan.k,
                        focus = %plan.focus,
                        "Plan decided"
                    );

                    if plan.need_retrieval {
                        Step::Retrieve { plan }
                    } else {
                        tracing::info!("Planner skipped retrieval");
                        Step::Reason {
                            plan,
                            retrieved: false,
                            context: String::new(),
                        }
                    }
                }

                Step::Retrieve { plan } => {
                    let prompt = self.prompts.render(
                        RoleId::Retriever,
                        &[
                            ("k", plan.k.to_string()),
                            ("query", query.to_string()),
                            ("focus", plan.focus.clone()),
                        ],
                    )?;
                    let request =
                        RoleRequest::new(prompt.user).with_retrieval(search_text(query, &plan.focus), plan.k);
                    let response = self.invoker.invoke(RoleId::Retriever, request).await?;

                    match response.citations {
                        Some(citations) if !citations.is_empty() => state.citations = citations,
                        _ => tracing::debug!("Retrieval returned no citations, keeping previous"),
                    }

                    Step::Reason {
                        plan,
                        retrieved: true,
                        context: response.content,
                    }
                }

                Step::Reason {
                    plan,
                    retrieved,
                    context,
                } => {
                    let prompt = self.prompts.render(
                        RoleId::Reasoner,
                        &[("query", query.to_string()), ("context", context)],
                    )?;
                    let response = self.invoker.invoke(RoleId::Reasoner, RoleRequest::new(prompt.user)).await?;

                    Step::Verify {
                        plan,
                        retrieved,
                        answer: response.content,
                    }
                }

                Step::Verify {
                    plan,
                    retrieved,
                    answer,
                } => {
                    let prompt = self.prompts.render(RoleId::Verifier, &[("answer", answer.clone())])?;
                    let response = self.invoker.invoke(RoleId::Verifier, RoleRequest::new(prompt.user)).await?;
                    let verdict =
                        Verdict::from_record(&parse_record(&response.content, Verdict::fallback_record()));

                    if verdict.supported {
                        Step::Reflect {
                            plan,
                            retrieved,
                            answer,
                            verdict,
                        }
                    } else {
                        tracing::info!(issues = ?verdict.issues, "Answer not supported by context");
                        Step::Done {
                            record: AttemptRecord {
                                attempt,
                                plan,
                                retrieved,
                                verdict,
                                reflection: None,
                                decision: AttemptDecision::Unsupported,
                            },
                            answer: None,
                        }
                    }
                }

                Step::Reflect {
                    plan,
                    retrieved,
                    answer,
                    verdict,
                } => {
                    let prompt = self.prompts.render(RoleId::Reflector, &[("answer", answer.clone())])?;
                    let response = self.invoker.invoke(RoleId::Reflector, RoleRequest::new(prompt.user)).await?;
                    let reflection = Reflection::from_record(&parse_record(
                        &response.content,
                        Reflection::fallback_record(),
                    ));
                    state.confidence = reflection.confidence;

                    let (decision, answer) = if reflection.confidence >= CONFIDENCE_THRESHOLD {
                        tracing::info!(confidence = reflection.confidence, "Answer accepted");
                        (AttemptDecision::Accepted, Some(answer))
                    } else {
                        tracing::info!(
                            confidence = reflection.confidence,
                            threshold = CONFIDENCE_THRESHOLD,
                            "Confidence below threshold"
                        );
                        (AttemptDecision::LowConfidence, None)
                    };

                    Step::Done {
                        record: AttemptRecord {
                            attempt,
                            plan,
                            retrieved,
                            verdict,
                            reflection: Some(reflection),
                            decision,
                        },
                        answer,
                    }
                }

                Step::Done { record, answer } => return Ok((record, answer)),
            };
        }
    }
}

/// Text searched in the knowledge store: the query, sharpened by the
/// planner's focus when it gave one.
fn search_text(query: &str, focus: &str) -> String {
    let focus = focus.trim();
    if focus.is_empty() {
        query.to_string()
    } else {
        format!("{} {}", query, focus)
    }
}
