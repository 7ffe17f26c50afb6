//! Shared error definitions for agent primitives.

use thiserror::Error;
use uuid::Error as UuidError;

/// Result alias used throughout the agent runtime.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while manipulating primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided run identifier could not be parsed.
    #[error("invalid run id: {source}")]
    InvalidRunId {
        /// Source parsing error from the UUID library.
        #[from]
        source: UuidError,
    },

    /// Agent name failed validation.
    #[error("invalid agent name `{name}`: {reason}")]
    InvalidAgentName {
        /// The offending name.
        name: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Tool name failed validation.
    #[error("invalid tool name `{name}`: {reason}")]
    InvalidToolName {
        /// The offending name.
        name: String,
        /// Human-readable reason for rejection.
        reason: String,
    },
}
