//! Agentic orchestration for crag.
//!
//! Five model roles (planner, retriever, reasoner, verifier, reflector) are
//! configured once at startup and driven by [`Orchestrator`] through a
//! bounded plan, retrieve, reason, verify and reflect loop. Structured role
//! output is decoded leniently by [`parse_record`].

pub mod invoker;
pub mod orchestrator;
pub mod parser;
pub mod roles;
pub mod types;

// Re-export commonly used types
pub use invoker::{LlmRoleInvoker, RetrievalRequest, RoleInvoker, RoleRequest, RoleResponse};
pub use orchestrator::{Orchestrator, Outcome, CONFIDENCE_THRESHOLD, MAX_RETRIES};
pub use parser::{decode_or_default, parse_record, Record};
pub use roles::{build_role_configs, RoleConfig, RoleId, RolePrompts, RoleTool};
pub use types::{
    AttemptDecision, AttemptRecord, FinalResult, Plan, Reflection, Verdict, DEFAULT_TOP_K,
    MAX_TOP_K,
};
