//! Agent orchestration runtime.
//!
//! Bundles the runtime crates behind feature flags. Most programs only need
//! the [`prelude`]: build [`Agent`](prelude::Agent)s, put them in an
//! [`AgentRegistry`](prelude::AgentRegistry), and drive runs with a
//! [`Runner`](prelude::Runner) over any [`ModelGateway`](prelude::ModelGateway).

#![warn(missing_docs, clippy::pedantic)]

/// Identifiers and name validation.
pub use agent_primitives as primitives;

/// Turn executor, handoffs, agents-as-tools, and fan-out (enabled by `kernel`).
#[cfg(feature = "kernel")]
pub use agent_kernel as kernel;

/// Model gateway boundary and wrappers (enabled by `adapters`).
#[cfg(feature = "adapters")]
pub use agent_adapters as adapters;

/// Tool registry and invocation (enabled by `tools`).
#[cfg(feature = "tools")]
pub use agent_tools as tools;

/// Caller-owned task and note store (enabled by `memory`).
#[cfg(feature = "memory")]
pub use agent_memory as memory;

/// Guardrail pipelines and built-in checks (enabled by `policy`).
#[cfg(feature = "policy")]
pub use agent_policy as policy;

/// Tracing subscriber setup for binaries (enabled by `telemetry`).
#[cfg(feature = "telemetry")]
pub use agent_telemetry as telemetry;

/// Run configuration loading (enabled by `config`).
#[cfg(feature = "config")]
pub use agent_config as config;

/// The types needed to define agents and run them.
#[cfg(feature = "kernel")]
pub mod prelude {
    pub use agent_adapters::traits::{Message, ModelGateway, ModelResponse};
    pub use agent_config::RunConfig;
    pub use agent_kernel::{
        AbortReason, Agent, AgentRegistry, AgentTool, RunAborted, RunOptions, RunOutcome,
        RunResult, Runner,
    };
    pub use agent_policy::{Guardrail, GuardrailResult, Severity};
    pub use agent_tools::registry::{ToolBinding, ToolMetadata};
}
