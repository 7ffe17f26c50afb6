//! Verdicts produced by individual guardrail checks.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How a failing check affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// A failure aborts the current run.
    Tripwire,
    /// A failure is reported but the run continues.
    Advisory,
}

/// Outcome of one guardrail check against one payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailResult {
    guardrail: String,
    passed: bool,
    severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    metadata: Map<String, Value>,
}

impl GuardrailResult {
    /// Returns a passing verdict.
    #[must_use]
    pub fn pass(guardrail: impl Into<String>, severity: Severity) -> Self {
        Self {
            guardrail: guardrail.into(),
            passed: true,
            severity,
            reason: None,
            metadata: Map::new(),
        }
    }

    /// Returns a failing verdict with an explanatory reason.
    #[must_use]
    pub fn fail(
        guardrail: impl Into<String>,
        severity: Severity,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            guardrail: guardrail.into(),
            passed: false,
            severity,
            reason: Some(reason.into()),
            metadata: Map::new(),
        }
    }

    /// Attaches a diagnostic entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Name of the check that produced the verdict.
    #[must_use]
    pub fn guardrail(&self) -> &str {
        &self.guardrail
    }

    /// Returns true when the check passed.
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.passed
    }

    /// Returns the severity configured for the check.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    /// Returns the failure reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Returns the diagnostic payload.
    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Returns true for a failing tripwire check.
    #[must_use]
    pub fn is_tripped(&self) -> bool {
        !self.passed && self.severity == Severity::Tripwire
    }

    /// Returns true for a failing advisory check.
    #[must_use]
    pub fn is_advisory_failure(&self) -> bool {
        !self.passed && self.severity == Severity::Advisory
    }
}
