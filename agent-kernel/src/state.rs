//! Run lifecycle state machine and per-run conversation state.

use std::fmt;
use std::sync::Arc;

use agent_adapters::traits::Message;
use agent_policy::GuardrailResult;
use agent_primitives::RunId;
use thiserror::Error;
use tracing::debug;

use crate::agent::Agent;

/// States a run can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Transcript seeded; input guardrails pending.
    Started,
    /// Waiting for the model gateway.
    AwaitingModel,
    /// Executing the tool calls of the last model turn.
    ToolDispatch,
    /// Control was just transferred to another agent.
    HandedOff,
    /// Final answer accepted.
    Completed,
    /// Run stopped early; see the abort reason.
    Aborted,
}

impl RunState {
    /// Returns `true` once no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Started => "started",
            Self::AwaitingModel => "awaiting_model",
            Self::ToolDispatch => "tool_dispatch",
            Self::HandedOff => "handed_off",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        })
    }
}

/// Events that advance a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEvent {
    /// Input guardrails passed.
    InputAccepted,
    /// The model requested tool calls.
    ToolsRequested,
    /// Every requested tool produced a result.
    ToolsCompleted,
    /// The model selected a valid handoff target.
    HandoffAccepted,
    /// The new agent takes its first turn.
    Resumed,
    /// The model response was rejected and the model is asked again.
    Reprompted,
    /// Output guardrails accepted the final answer.
    Answered,
    /// The run stops early.
    Abort,
}

/// Validated state holder for one run.
#[derive(Debug, Clone, Copy)]
pub struct RunLifecycle {
    run_id: RunId,
    state: RunState,
}

impl RunLifecycle {
    /// Creates a lifecycle in [`RunState::Started`].
    #[must_use]
    pub const fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            state: RunState::Started,
        }
    }

    /// Returns the owning run.
    #[must_use]
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> RunState {
        self.state
    }

    /// Applies an event, returning the resulting state.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::InvalidTransition`] when the event is not
    /// allowed from the current state.
    pub fn transition(&mut self, event: RunEvent) -> Result<RunState, TransitionError> {
        let next = match (self.state, event) {
            (RunState::Started, RunEvent::InputAccepted)
            | (RunState::ToolDispatch, RunEvent::ToolsCompleted)
            | (RunState::HandedOff, RunEvent::Resumed)
            | (RunState::AwaitingModel, RunEvent::Reprompted) => Some(RunState::AwaitingModel),
            (RunState::AwaitingModel, RunEvent::ToolsRequested) => Some(RunState::ToolDispatch),
            (RunState::AwaitingModel, RunEvent::HandoffAccepted) => Some(RunState::HandedOff),
            (RunState::AwaitingModel, RunEvent::Answered) => Some(RunState::Completed),
            (state, RunEvent::Abort) if !state.is_terminal() => Some(RunState::Aborted),
            _ => None,
        };

        let Some(next_state) = next else {
            return Err(TransitionError::InvalidTransition {
                run_id: self.run_id,
                from: self.state,
                event,
            });
        };

        debug!(
            run_id = %self.run_id,
            from = %self.state,
            to = %next_state,
            ?event,
            "run transition"
        );
        self.state = next_state;
        Ok(next_state)
    }
}

/// Errors emitted by the lifecycle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    /// Transition was not permitted from the current state.
    #[error("invalid run transition from {from} via {event:?} for run {run_id}")]
    InvalidTransition {
        /// Run whose transition failed.
        run_id: RunId,
        /// State prior to the attempted transition.
        from: RunState,
        /// Event that triggered the failure.
        event: RunEvent,
    },
}

/// Mutable conversation state owned by one executing run.
///
/// Only the executor driving the run touches it, so it carries no locking.
#[derive(Debug)]
pub(crate) struct TurnState {
    lifecycle: RunLifecycle,
    active: Arc<Agent>,
    history: Vec<Message>,
    turns: usize,
    advisories: Vec<GuardrailResult>,
}

impl TurnState {
    pub(crate) fn new(run_id: RunId, agent: Arc<Agent>, input: String) -> Self {
        Self {
            lifecycle: RunLifecycle::new(run_id),
            active: agent,
            history: vec![Message::user(input)],
            turns: 0,
            advisories: Vec::new(),
        }
    }

    pub(crate) fn run_id(&self) -> RunId {
        self.lifecycle.run_id()
    }

    pub(crate) fn state(&self) -> RunState {
        self.lifecycle.state()
    }

    pub(crate) fn lifecycle_mut(&mut self) -> &mut RunLifecycle {
        &mut self.lifecycle
    }

    pub(crate) fn agent(&self) -> &Arc<Agent> {
        &self.active
    }

    /// Swaps the active agent and records the transfer in the transcript.
    pub(crate) fn hand_off(&mut self, target: Arc<Agent>) {
        self.history.push(Message::Handoff {
            from: self.active.name().clone(),
            to: target.name().clone(),
        });
        self.active = target;
    }

    pub(crate) fn history(&self) -> &[Message] {
        &self.history
    }

    pub(crate) fn push(&mut self, message: Message) {
        self.history.push(message);
    }

    pub(crate) fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.history.extend(messages);
    }

    pub(crate) fn turns(&self) -> usize {
        self.turns
    }

    pub(crate) fn begin_turn(&mut self) -> usize {
        self.turns += 1;
        self.turns
    }

    pub(crate) fn note_advisories(&mut self, results: impl IntoIterator<Item = GuardrailResult>) {
        self.advisories
            .extend(results.into_iter().filter(GuardrailResult::is_advisory_failure));
    }

    pub(crate) fn into_parts(self) -> (Arc<Agent>, Vec<Message>, usize, Vec<GuardrailResult>) {
        (self.active, self.history, self.turns, self.advisories)
    }
}
