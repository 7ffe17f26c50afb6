//! Errors raised while assembling agents and registries.

use agent_primitives::Error as PrimitiveError;
use agent_tools::registry::ToolError;
use thiserror::Error;

/// Result alias for agent and registry construction.
pub type KernelResult<T> = Result<T, KernelError>;

/// Construction-time failures.
///
/// Run-time failures never surface as `KernelError`; they are reported as
/// [`AbortReason`](crate::AbortReason) values on the run outcome.
#[derive(Debug, Error)]
pub enum KernelError {
    /// An agent or tool name failed validation.
    #[error(transparent)]
    InvalidName(#[from] PrimitiveError),

    /// A tool could not be registered on an agent.
    #[error("agent `{agent}`: {source}")]
    Tool {
        /// Agent being built.
        agent: String,
        /// Registration failure.
        #[source]
        source: ToolError,
    },

    /// A handoff declaration is unusable.
    #[error("agent `{agent}` has an invalid handoff: {reason}")]
    InvalidHandoff {
        /// Agent declaring the handoff.
        agent: String,
        /// Human-readable explanation.
        reason: String,
    },

    /// Two agents share a name.
    #[error("agent `{name}` is already registered")]
    DuplicateAgent {
        /// Colliding name.
        name: String,
    },

    /// A handoff names an agent the registry does not hold.
    #[error("agent `{agent}` hands off to unknown agent `{target}`")]
    UnknownHandoffTarget {
        /// Agent declaring the handoff.
        agent: String,
        /// Missing target.
        target: String,
    },

    /// The requested agent is not registered.
    #[error("agent `{name}` is not registered")]
    UnknownAgent {
        /// Requested name.
        name: String,
    },
}
