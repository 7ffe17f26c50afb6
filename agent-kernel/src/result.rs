//! Structured run outcomes.

use std::time::Duration;

use agent_adapters::traits::Message;
use agent_policy::GuardrailResult;
use agent_primitives::{AgentName, RunId};
use thiserror::Error;

/// Outcome of a run: a completed result or a named abort.
pub type RunOutcome = Result<RunResult, RunAborted>;

/// Output of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    run_id: RunId,
    final_output: String,
    last_agent: AgentName,
    history: Vec<Message>,
    turns: usize,
    advisories: Vec<GuardrailResult>,
}

impl RunResult {
    pub(crate) fn new(
        run_id: RunId,
        final_output: String,
        last_agent: AgentName,
        history: Vec<Message>,
        turns: usize,
        advisories: Vec<GuardrailResult>,
    ) -> Self {
        Self {
            run_id,
            final_output,
            last_agent,
            history,
            turns,
            advisories,
        }
    }

    /// Identifier of the run.
    #[must_use]
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Final answer text.
    #[must_use]
    pub fn final_output(&self) -> &str {
        &self.final_output
    }

    /// Agent that produced the final answer.
    #[must_use]
    pub fn last_agent(&self) -> &AgentName {
        &self.last_agent
    }

    /// Full transcript, starting with the user input.
    #[must_use]
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Number of model turns taken.
    #[must_use]
    pub const fn turns(&self) -> usize {
        self.turns
    }

    /// Advisory guardrail failures observed during the run.
    #[must_use]
    pub fn advisories(&self) -> &[GuardrailResult] {
        &self.advisories
    }

    /// Consumes the result, returning the final answer.
    #[must_use]
    pub fn into_output(self) -> String {
        self.final_output
    }
}

/// Why a run stopped before completing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AbortReason {
    /// An input guardrail tripped; the gateway was never called.
    #[error("input blocked by guardrail `{guardrail}`: {reason}")]
    InputBlocked {
        /// Tripped check.
        guardrail: String,
        /// Reason reported by the check.
        reason: String,
        /// Every verdict of the input pipeline.
        verdicts: Vec<GuardrailResult>,
    },

    /// An output guardrail tripped on the final answer.
    #[error("output blocked by guardrail `{guardrail}`: {reason}")]
    OutputBlocked {
        /// Tripped check.
        guardrail: String,
        /// Reason reported by the check.
        reason: String,
        /// Every verdict of the output pipeline.
        verdicts: Vec<GuardrailResult>,
    },

    /// The model did not converge within the turn limit.
    #[error("iteration limit of {limit} model turns exceeded")]
    IterationLimitExceeded {
        /// Configured limit.
        limit: usize,
    },

    /// The gateway failed or did not answer in time.
    #[error("model gateway unavailable: {reason}")]
    GatewayUnavailable {
        /// Gateway error text.
        reason: String,
    },

    /// The whole-run deadline elapsed.
    #[error("run timed out after {after:?}")]
    TimedOut {
        /// Deadline that elapsed.
        after: Duration,
    },

    /// The caller or a parent run cancelled the run.
    #[error("run cancelled")]
    Cancelled,

    /// The run could not be driven to completion (task panic, internal
    /// state error).
    #[error("run task failed: {reason}")]
    TaskFailed {
        /// Failure description.
        reason: String,
    },
}

impl AbortReason {
    /// Returns `true` when the caller may retry the run as-is.
    ///
    /// Only gateway failures qualify; guardrail trips and iteration limits
    /// would recur on retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::GatewayUnavailable { .. })
    }

    /// Returns `true` for guardrail tripwires.
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::InputBlocked { .. } | Self::OutputBlocked { .. })
    }
}

/// A run that stopped early, with the transcript up to that point.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("run {run_id} aborted in agent `{last_agent}`: {reason}")]
pub struct RunAborted {
    run_id: RunId,
    #[source]
    reason: AbortReason,
    last_agent: AgentName,
    history: Vec<Message>,
    turns: usize,
}

impl RunAborted {
    pub(crate) fn new(
        run_id: RunId,
        reason: AbortReason,
        last_agent: AgentName,
        history: Vec<Message>,
        turns: usize,
    ) -> Self {
        Self {
            run_id,
            reason,
            last_agent,
            history,
            turns,
        }
    }

    /// Identifier of the run.
    #[must_use]
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Why the run stopped.
    #[must_use]
    pub fn reason(&self) -> &AbortReason {
        &self.reason
    }

    /// Agent that was active when the run stopped.
    #[must_use]
    pub fn last_agent(&self) -> &AgentName {
        &self.last_agent
    }

    /// Transcript up to the abort.
    #[must_use]
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Number of model turns taken.
    #[must_use]
    pub const fn turns(&self) -> usize {
        self.turns
    }

    /// Consumes the value, returning the reason.
    #[must_use]
    pub fn into_reason(self) -> AbortReason {
        self.reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_gateway_failures_are_retryable() {
        assert!(
            AbortReason::GatewayUnavailable {
                reason: "reset".into()
            }
            .is_retryable()
        );
        assert!(!AbortReason::IterationLimitExceeded { limit: 3 }.is_retryable());
        assert!(!AbortReason::Cancelled.is_retryable());

        let blocked = AbortReason::InputBlocked {
            guardrail: "pii".into(),
            reason: "ssn".into(),
            verdicts: Vec::new(),
        };
        assert!(blocked.is_blocked());
        assert!(!blocked.is_retryable());
    }

    #[test]
    fn aborted_display_names_agent_and_reason() {
        let aborted = RunAborted::new(
            RunId::random(),
            AbortReason::IterationLimitExceeded { limit: 2 },
            AgentName::new("Looper").unwrap(),
            vec![Message::user("hi")],
            2,
        );
        let text = aborted.to_string();
        assert!(text.contains("`Looper`"));
        assert!(text.contains("iteration limit of 2"));
        assert_eq!(aborted.history().len(), 1);
    }
}
