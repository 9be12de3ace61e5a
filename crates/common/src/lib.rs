//! Shared types used across the orchestrator workspace.

mod types;

pub use types::RunId;
