//! Run lifecycle state machine and turn executor.
//!
//! A [`Runner`] drives one agent conversation at a time per call: input
//! guardrails, then repeated model turns that either answer, call tools, or
//! hand control to a peer agent, then output guardrails. Every run ends in a
//! [`RunOutcome`]: a [`RunResult`] or a [`RunAborted`] naming why it stopped.
//!
//! On top of the single-run loop the crate offers agents-as-tools
//! ([`AgentTool`]) and bounded parallel fan-out with aggregation
//! ([`Runner::run_parallel`], [`Runner::run_parallel_then_aggregate`]).

#![warn(missing_docs, clippy::pedantic)]

mod agent;
mod agent_tool;
mod error;
mod executor;
mod hooks;
mod orchestrator;
mod registry;
mod result;
mod scheduler;
mod state;

pub use agent::{Agent, AgentBuilder};
pub use agent_tool::AgentTool;
pub use error::{KernelError, KernelResult};
pub use executor::{RunOptions, Runner};
pub use hooks::{CompositeHooks, HookEvent, RecordingHooks, RunHooks, TracingHooks};
pub use orchestrator::{DEFAULT_AGGREGATION_PREAMBLE, FanOutOutcome, FanOutReport};
pub use registry::{AgentRegistry, AgentRegistryBuilder};
pub use result::{AbortReason, RunAborted, RunOutcome, RunResult};
pub use scheduler::{SchedulerConfig, SchedulerError, SchedulerResult, TaskScheduler};
pub use state::{RunEvent, RunLifecycle, RunState, TransitionError};
