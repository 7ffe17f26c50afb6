//! Per-invocation context handed to tool handlers.

use agent_primitives::{AgentName, CallId, RunId};
use tokio_util::sync::CancellationToken;

/// Identifies the run and call a handler executes for.
///
/// Handlers that spawn work of their own (nested agent runs, background
/// requests) must observe [`ToolContext::cancellation`] so that aborting the
/// parent run stops them promptly.
#[derive(Debug, Clone)]
pub struct ToolContext {
    run_id: RunId,
    agent: AgentName,
    call_id: CallId,
    cancellation: CancellationToken,
}

impl ToolContext {
    /// Creates a context with a fresh, never-cancelled token.
    #[must_use]
    pub fn new(run_id: RunId, agent: AgentName, call_id: CallId) -> Self {
        Self {
            run_id,
            agent,
            call_id,
            cancellation: CancellationToken::new(),
        }
    }

    /// Replaces the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Returns the run the call belongs to.
    #[must_use]
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Returns the agent that requested the call.
    #[must_use]
    pub fn agent(&self) -> &AgentName {
        &self.agent
    }

    /// Returns the model-supplied call identifier.
    #[must_use]
    pub fn call_id(&self) -> &CallId {
        &self.call_id
    }

    /// Returns the token cancelled when the owning run is aborted.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}
