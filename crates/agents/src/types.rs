//! Values produced and consumed by the orchestration loop.

use crate::parser::Record;
use crag_knowledge::Citation;
use serde::Serialize;
use serde_json::{json, Value};

/// Chunks retrieved when the planner does not say.
pub const DEFAULT_TOP_K: usize = 4;

/// Upper bound on chunks a plan may request.
pub const MAX_TOP_K: usize = 50;

/// The planner's decision for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub need_retrieval: bool,
    pub k: usize,
    pub focus: String,
}

impl Default for Plan {
    fn default() -> Self {
        Self {
            need_retrieval: true,
            k: DEFAULT_TOP_K,
            focus: String::new(),
        }
    }
}

impl Plan {
    /// Record substituted when the planner output does not decode.
    pub fn fallback_record() -> Record {
        to_record(json!({"need_retrieval": true, "k": DEFAULT_TOP_K, "focus": ""}))
    }

    /// Read a plan from a decoded record; absent or mistyped fields take
    /// their defaults and `k` is clamped to `1..=MAX_TOP_K`.
    pub fn from_record(record: &Record) -> Self {
        let need_retrieval = record
            .get("need_retrieval")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let k = record
            .get("k")
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .map(|k| k.clamp(1, MAX_TOP_K as i64) as usize)
            .unwrap_or(DEFAULT_TOP_K);

        let focus = record
            .get("focus")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Self {
            need_retrieval,
            k,
            focus,
        }
    }
}

/// The verifier's judgement of an answer.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Verdict {
    pub supported: bool,
    pub issues: Vec<String>,
}

impl Verdict {
    pub fn fallback_record() -> Record {
        to_record(json!({"supported": false}))
    }

    pub fn from_record(record: &Record) -> Self {
        // Only a JSON boolean counts; `1` and `"true"` are unsupported.
        let supported = record
            .get("supported")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let issues = record
            .get("issues")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self { supported, issues }
    }
}

/// The reflector's self-assessment of an answer.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Reflection {
    pub confidence: f64,
    pub explanation: String,
}

impl Reflection {
    pub fn fallback_record() -> Record {
        to_record(json!({"confidence": 0.0}))
    }

    pub fn from_record(record: &Record) -> Self {
        Self {
            confidence: record
                .get("confidence")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            explanation: record
                .get("explanation")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// How an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptDecision {
    /// Verifier rejected the answer; reflection was skipped
    Unsupported,
    /// Reflection ran but confidence stayed below the threshold
    LowConfidence,
    /// Answer accepted; the loop stops
    Accepted,
}

/// Trace of one attempt, kept for logs and `--json` output only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    /// 1-based attempt number
    pub attempt: u32,
    pub plan: Plan,
    pub retrieved: bool,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reflection: Option<Reflection>,
    pub decision: AttemptDecision,
}

/// Terminal result of a submission.
///
/// `answer` is present only when an attempt was accepted. On failure
/// `confidence` still holds the last reflected value (0.0 when no attempt
/// reached reflection); it is never presented as an accepted confidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalResult {
    pub answer: Option<String>,
    pub confidence: f64,
    pub citations: Vec<Citation>,
}

impl FinalResult {
    pub fn is_success(&self) -> bool {
        self.answer.is_some()
    }
}

fn to_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}
