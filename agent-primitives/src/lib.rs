//! Core shared types for the agent orchestration runtime.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod ids;
mod names;

/// Error type and result alias shared across the runtime.
pub use error::{Error, Result};
/// Identifiers for runs and tool calls.
pub use ids::{CallId, RunId};
/// Validated agent and tool names.
pub use names::{AgentName, ToolName};
