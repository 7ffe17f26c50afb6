//! Observation points around a run.
//!
//! Hooks are plain synchronous callbacks invoked by the executor before the
//! run starts, after every state transition, on handoff, after each tool
//! call, and when the run ends. The executor never depends on what a hook
//! does with the information.

use std::sync::{Arc, Mutex, PoisonError};

use agent_adapters::traits::ToolCall;
use agent_primitives::{AgentName, RunId};
use agent_tools::registry::{ToolOutput, ToolResult};
use tracing::{debug, info, warn};

use crate::result::RunOutcome;
use crate::state::RunState;

/// Observer invoked at well-defined points of a run.
pub trait RunHooks: Send + Sync {
    /// Called once before input guardrails run.
    fn on_run_start(&self, run_id: RunId, agent: &AgentName, input: &str) {
        let _ = (run_id, agent, input);
    }

    /// Called after every lifecycle transition.
    fn on_transition(&self, run_id: RunId, from: RunState, to: RunState) {
        let _ = (run_id, from, to);
    }

    /// Called when control moves to another agent.
    fn on_handoff(&self, run_id: RunId, from: &AgentName, to: &AgentName) {
        let _ = (run_id, from, to);
    }

    /// Called when a tool call finished, failed, or was rejected.
    fn on_tool_result(&self, run_id: RunId, call: &ToolCall, result: &ToolResult<ToolOutput>) {
        let _ = (run_id, call, result);
    }

    /// Called once with the final outcome.
    fn on_run_end(&self, run_id: RunId, outcome: &RunOutcome) {
        let _ = (run_id, outcome);
    }
}

/// Hooks that log through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHooks;

impl RunHooks for TracingHooks {
    fn on_run_start(&self, run_id: RunId, agent: &AgentName, input: &str) {
        debug!(%run_id, %agent, input_len = input.len(), "run started");
    }

    fn on_handoff(&self, run_id: RunId, from: &AgentName, to: &AgentName) {
        info!(%run_id, %from, %to, "handoff");
    }

    fn on_tool_result(&self, run_id: RunId, call: &ToolCall, result: &ToolResult<ToolOutput>) {
        match result {
            Ok(_) => debug!(
                %run_id,
                tool = %call.tool_name,
                call_id = %call.call_id,
                "tool call finished"
            ),
            Err(err) => warn!(
                %run_id,
                tool = %call.tool_name,
                call_id = %call.call_id,
                kind = ?err.kind(),
                error = %err,
                "tool call failed"
            ),
        }
    }

    fn on_run_end(&self, run_id: RunId, outcome: &RunOutcome) {
        match outcome {
            Ok(result) => info!(
                %run_id,
                agent = %result.last_agent(),
                turns = result.turns(),
                "run completed"
            ),
            Err(aborted) => warn!(
                %run_id,
                agent = %aborted.last_agent(),
                reason = %aborted.reason(),
                "run aborted"
            ),
        }
    }
}

/// Forwards every callback to a list of hooks, in order.
#[derive(Default, Clone)]
pub struct CompositeHooks {
    hooks: Vec<Arc<dyn RunHooks>>,
}

impl CompositeHooks {
    /// Creates a composite from the supplied hooks.
    #[must_use]
    pub fn new<I>(hooks: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn RunHooks>>,
    {
        Self {
            hooks: hooks.into_iter().collect(),
        }
    }
}

impl RunHooks for CompositeHooks {
    fn on_run_start(&self, run_id: RunId, agent: &AgentName, input: &str) {
        for hook in &self.hooks {
            hook.on_run_start(run_id, agent, input);
        }
    }

    fn on_transition(&self, run_id: RunId, from: RunState, to: RunState) {
        for hook in &self.hooks {
            hook.on_transition(run_id, from, to);
        }
    }

    fn on_handoff(&self, run_id: RunId, from: &AgentName, to: &AgentName) {
        for hook in &self.hooks {
            hook.on_handoff(run_id, from, to);
        }
    }

    fn on_tool_result(&self, run_id: RunId, call: &ToolCall, result: &ToolResult<ToolOutput>) {
        for hook in &self.hooks {
            hook.on_tool_result(run_id, call, result);
        }
    }

    fn on_run_end(&self, run_id: RunId, outcome: &RunOutcome) {
        for hook in &self.hooks {
            hook.on_run_end(run_id, outcome);
        }
    }
}

/// Event captured by [`RecordingHooks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    /// Run started on the named agent.
    RunStarted {
        /// Starting agent.
        agent: String,
    },
    /// Lifecycle transition.
    Transition {
        /// Previous state.
        from: RunState,
        /// New state.
        to: RunState,
    },
    /// Control moved between agents.
    Handoff {
        /// Previous agent.
        from: String,
        /// New agent.
        to: String,
    },
    /// A tool call finished.
    ToolResult {
        /// Tool name.
        tool: String,
        /// Whether the call failed.
        is_error: bool,
    },
    /// Run ended.
    RunEnded {
        /// Whether the run completed.
        completed: bool,
    },
}

/// Hooks that keep every event in memory, for tests and demos.
#[derive(Debug, Default)]
pub struct RecordingHooks {
    events: Mutex<Vec<(RunId, HookEvent)>>,
}

impl RecordingHooks {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded events in arrival order.
    #[must_use]
    pub fn events(&self) -> Vec<HookEvent> {
        self.lock().iter().map(|(_, event)| event.clone()).collect()
    }

    /// Returns the events recorded for one run.
    #[must_use]
    pub fn events_for(&self, run_id: RunId) -> Vec<HookEvent> {
        self.lock()
            .iter()
            .filter(|(id, _)| *id == run_id)
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Returns the states visited by one run, starting with
    /// [`RunState::Started`].
    #[must_use]
    pub fn states_for(&self, run_id: RunId) -> Vec<RunState> {
        let mut states = vec![RunState::Started];
        states.extend(self.events_for(run_id).into_iter().filter_map(|event| match event {
            HookEvent::Transition { to, .. } => Some(to),
            _ => None,
        }));
        states
    }

    fn record(&self, run_id: RunId, event: HookEvent) {
        self.lock().push((run_id, event));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(RunId, HookEvent)>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RunHooks for RecordingHooks {
    fn on_run_start(&self, run_id: RunId, agent: &AgentName, _input: &str) {
        self.record(
            run_id,
            HookEvent::RunStarted {
                agent: agent.to_string(),
            },
        );
    }

    fn on_transition(&self, run_id: RunId, from: RunState, to: RunState) {
        self.record(run_id, HookEvent::Transition { from, to });
    }

    fn on_handoff(&self, run_id: RunId, from: &AgentName, to: &AgentName) {
        self.record(
            run_id,
            HookEvent::Handoff {
                from: from.to_string(),
                to: to.to_string(),
            },
        );
    }

    fn on_tool_result(&self, run_id: RunId, call: &ToolCall, result: &ToolResult<ToolOutput>) {
        self.record(
            run_id,
            HookEvent::ToolResult {
                tool: call.tool_name.clone(),
                is_error: result.is_err(),
            },
        );
    }

    fn on_run_end(&self, run_id: RunId, outcome: &RunOutcome) {
        self.record(
            run_id,
            HookEvent::RunEnded {
                completed: outcome.is_ok(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_forwards_to_every_hook() {
        let first = Arc::new(RecordingHooks::new());
        let second = Arc::new(RecordingHooks::new());
        let composite = CompositeHooks::new([
            Arc::clone(&first) as Arc<dyn RunHooks>,
            Arc::clone(&second) as Arc<dyn RunHooks>,
        ]);

        let run_id = RunId::random();
        composite.on_transition(run_id, RunState::Started, RunState::AwaitingModel);

        assert_eq!(first.events(), second.events());
        assert_eq!(
            first.states_for(run_id),
            [RunState::Started, RunState::AwaitingModel]
        );
        assert!(first.events_for(RunId::random()).is_empty());
    }
}
