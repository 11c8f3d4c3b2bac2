//! Role prompts for crag.
//!
//! Each orchestration role (planner, retriever, reasoner, verifier,
//! reflector) is described by a YAML definition: a fixed instruction list
//! and a Handlebars template for the per-call message. Built-in definitions
//! are compiled in; a workspace can override them under `.crag/prompts/`.

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{builtin_prompt, list_overrides, load_prompt, prompts_dir};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, PromptOutputSpec};
