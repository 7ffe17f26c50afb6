//! Error types for the workspace store.

use thiserror::Error;

/// Errors emitted by [`WorkspaceStore`](crate::WorkspaceStore).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// No task carries the requested id.
    #[error("task not found: {id}")]
    UnknownTask {
        /// Requested identifier.
        id: String,
    },

    /// A value could not be parsed into its domain type.
    #[error("invalid {field}: `{value}` ({reason})")]
    InvalidValue {
        /// Field being parsed.
        field: &'static str,
        /// Offending input.
        value: String,
        /// Accepted values or format.
        reason: &'static str,
    },

    /// A required text field was blank.
    #[error("{field} must not be empty")]
    Empty {
        /// Field that was blank.
        field: &'static str,
    },
}

impl StoreError {
    pub(crate) fn invalid(
        field: &'static str,
        value: impl Into<String>,
        reason: &'static str,
    ) -> Self {
        Self::InvalidValue {
            field,
            value: value.into(),
            reason,
        }
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
