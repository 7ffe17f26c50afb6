//! Guardrail pipelines applied to agent input and output.
//!
//! A [`GuardrailPipeline`] runs its checks concurrently and reports verdicts
//! in configuration order. Failing checks with [`Severity::Tripwire`] abort
//! the current run; advisory failures are only reported.

#![warn(missing_docs, clippy::pedantic)]

pub mod builtin;
pub mod decision;
pub mod engine;

pub use builtin::{
    BlocklistGuardrail, FnGuardrail, MaxLengthGuardrail, PROMPT_INJECTION_PHRASES, PiiGuardrail,
};
pub use decision::{GuardrailResult, Severity};
pub use engine::{Guardrail, GuardrailError, GuardrailPipeline, PipelineReport, PolicyResult};
