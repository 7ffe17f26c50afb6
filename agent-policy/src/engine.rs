//! Guardrail trait and concurrent pipeline evaluation.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, warn};

use crate::decision::{GuardrailResult, Severity};

/// Errors surfaced by guardrail construction and evaluation.
#[derive(Debug, Error)]
pub enum GuardrailError {
    /// Guardrail configuration was rejected.
    #[error("invalid guardrail: {reason}")]
    InvalidGuardrail {
        /// Human-readable explanation.
        reason: String,
    },
    /// A tripwire check failed; the run must abort.
    #[error("guardrail `{guardrail}` tripped: {reason}")]
    Tripped {
        /// First tripped check in reporting order.
        guardrail: String,
        /// Reason reported by that check.
        reason: String,
        /// Every verdict of the evaluation, in pipeline order.
        results: Vec<GuardrailResult>,
    },
}

impl GuardrailError {
    /// Convenience constructor for configuration errors.
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidGuardrail {
            reason: reason.into(),
        }
    }
}

/// Result alias for guardrail operations.
pub type PolicyResult<T> = Result<T, GuardrailError>;

/// A policy check over input or output text.
///
/// Checks must not share mutable state with each other; the pipeline runs
/// them concurrently.
#[async_trait]
pub trait Guardrail: Send + Sync {
    /// Name used in verdicts and logs.
    fn name(&self) -> &str;

    /// Evaluates the payload.
    async fn check(&self, payload: &str) -> GuardrailResult;
}

/// Ordered list of checks applied to one side of a run.
#[derive(Clone, Default)]
pub struct GuardrailPipeline {
    checks: Vec<Arc<dyn Guardrail>>,
}

impl fmt::Debug for GuardrailPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl GuardrailPipeline {
    /// Creates an empty pipeline, which always passes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a check.
    #[must_use]
    pub fn with_check<G>(mut self, check: G) -> Self
    where
        G: Guardrail + 'static,
    {
        self.checks.push(Arc::new(check));
        self
    }

    /// Returns the number of checks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Returns true when no checks are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Returns the check names in pipeline order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.checks.iter().map(|check| check.name()).collect()
    }

    /// Runs every check against `payload` concurrently.
    ///
    /// Verdicts are reported in pipeline order. A check that panics is
    /// reported as a failing tripwire verdict.
    pub async fn evaluate(&self, payload: &str) -> PipelineReport {
        let pending = self.checks.iter().map(|check| async move {
            match AssertUnwindSafe(check.check(payload)).catch_unwind().await {
                Ok(result) => result,
                Err(_) => GuardrailResult::fail(
                    check.name(),
                    Severity::Tripwire,
                    "guardrail check panicked",
                ),
            }
        });
        let results = join_all(pending).await;

        for result in results.iter().filter(|result| !result.passed()) {
            warn!(
                guardrail = result.guardrail(),
                severity = ?result.severity(),
                reason = result.reason().unwrap_or_default(),
                "guardrail check failed"
            );
        }
        debug!(checks = results.len(), "guardrail pipeline evaluated");

        PipelineReport { results }
    }
}

/// Verdicts of one pipeline evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineReport {
    results: Vec<GuardrailResult>,
}

impl PipelineReport {
    /// Returns every verdict in pipeline order.
    #[must_use]
    pub fn results(&self) -> &[GuardrailResult] {
        &self.results
    }

    /// Returns true when no tripwire check failed.
    #[must_use]
    pub fn passed(&self) -> bool {
        !self.results.iter().any(GuardrailResult::is_tripped)
    }

    /// Returns the first tripped verdict in pipeline order.
    #[must_use]
    pub fn tripped(&self) -> Option<&GuardrailResult> {
        self.results.iter().find(|result| result.is_tripped())
    }

    /// Returns the failing advisory verdicts.
    #[must_use]
    pub fn advisories(&self) -> Vec<&GuardrailResult> {
        self.results
            .iter()
            .filter(|result| result.is_advisory_failure())
            .collect()
    }

    /// Consumes the report and returns the verdicts.
    #[must_use]
    pub fn into_results(self) -> Vec<GuardrailResult> {
        self.results
    }

    /// Converts the report into a pass/abort outcome.
    ///
    /// # Errors
    ///
    /// Returns [`GuardrailError::Tripped`] when any tripwire check failed.
    pub fn into_result(self) -> PolicyResult<Vec<GuardrailResult>> {
        let Some(tripped) = self.tripped() else {
            return Ok(self.results);
        };
        let guardrail = tripped.guardrail().to_owned();
        let reason = tripped.reason().unwrap_or("check failed").to_owned();
        Err(GuardrailError::Tripped {
            guardrail,
            reason,
            results: self.results,
        })
    }
}
