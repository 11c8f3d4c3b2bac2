//! Command handlers for the crag CLI.

pub mod ask;
pub mod roles;
pub mod sources;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use roles::RolesCommand;
pub use sources::SourcesCommand;
