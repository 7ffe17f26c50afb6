//! Ready-made guardrail checks.

use std::fmt;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::decision::{GuardrailResult, Severity};
use crate::engine::{Guardrail, GuardrailError, PolicyResult};

const SSN_PATTERN: &str = r"\b\d{3}-\d{2}-\d{4}\b";
const CARD_PATTERN: &str = r"\b\d{4}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}\b";
const EMAIL_PATTERN: &str = r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b";

/// Phrases commonly used in prompt-injection attempts.
pub const PROMPT_INJECTION_PHRASES: &[&str] =
    &["ignore previous instructions", "system prompt", "jailbreak"];

/// Detects personally identifiable information with regular expressions.
///
/// Detected categories (`ssn`, `credit_card`, `email`) are reported under the
/// `categories` metadata key.
#[derive(Debug, Clone)]
pub struct PiiGuardrail {
    severity: Severity,
    detectors: Vec<(&'static str, Regex)>,
}

impl PiiGuardrail {
    /// Creates the check with the built-in detectors.
    ///
    /// # Errors
    ///
    /// Returns [`GuardrailError::InvalidGuardrail`] if a detector pattern
    /// fails to compile.
    pub fn new(severity: Severity) -> PolicyResult<Self> {
        let detectors = [
            ("ssn", SSN_PATTERN),
            ("credit_card", CARD_PATTERN),
            ("email", EMAIL_PATTERN),
        ]
        .into_iter()
        .map(|(category, pattern)| {
            Regex::new(pattern)
                .map(|regex| (category, regex))
                .map_err(|err| GuardrailError::invalid(format!("{category} detector: {err}")))
        })
        .collect::<PolicyResult<Vec<_>>>()?;

        Ok(Self {
            severity,
            detectors,
        })
    }

    /// Returns the categories detected in `payload`.
    #[must_use]
    pub fn detect(&self, payload: &str) -> Vec<&'static str> {
        self.detectors
            .iter()
            .filter(|(_, regex)| regex.is_match(payload))
            .map(|(category, _)| *category)
            .collect()
    }
}

#[async_trait]
impl Guardrail for PiiGuardrail {
    fn name(&self) -> &str {
        "pii"
    }

    async fn check(&self, payload: &str) -> GuardrailResult {
        let categories = self.detect(payload);
        if categories.is_empty() {
            return GuardrailResult::pass(self.name(), self.severity);
        }

        GuardrailResult::fail(
            self.name(),
            self.severity,
            format!("personal data detected: {}", categories.join(", ")),
        )
        .with_metadata(
            "categories",
            categories.into_iter().map(Value::from).collect::<Vec<_>>(),
        )
    }
}

/// Fails when the payload contains any listed phrase, ignoring case.
#[derive(Debug, Clone)]
pub struct BlocklistGuardrail {
    name: String,
    phrases: Vec<String>,
    severity: Severity,
}

impl BlocklistGuardrail {
    /// Creates a blocklist check.
    ///
    /// # Errors
    ///
    /// Returns [`GuardrailError::InvalidGuardrail`] when the name is blank,
    /// no phrases are given, or a phrase is blank.
    pub fn new<I, S>(name: impl Into<String>, phrases: I, severity: Severity) -> PolicyResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(GuardrailError::invalid("guardrail name cannot be empty"));
        }

        let phrases = phrases
            .into_iter()
            .map(|phrase| phrase.as_ref().trim().to_lowercase())
            .collect::<Vec<_>>();
        if phrases.is_empty() || phrases.iter().any(String::is_empty) {
            return Err(GuardrailError::invalid(
                "blocklist requires at least one non-blank phrase",
            ));
        }

        Ok(Self {
            name,
            phrases,
            severity,
        })
    }

    /// Blocklist of common prompt-injection phrases.
    ///
    /// # Errors
    ///
    /// Never fails in practice; see [`BlocklistGuardrail::new`].
    pub fn prompt_injection(severity: Severity) -> PolicyResult<Self> {
        Self::new("content_safety", PROMPT_INJECTION_PHRASES, severity)
    }
}

#[async_trait]
impl Guardrail for BlocklistGuardrail {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, payload: &str) -> GuardrailResult {
        let haystack = payload.to_lowercase();
        match self.phrases.iter().find(|phrase| haystack.contains(phrase.as_str())) {
            Some(phrase) => GuardrailResult::fail(
                &self.name,
                self.severity,
                format!("contains potentially unsafe content: {phrase}"),
            )
            .with_metadata("phrase", phrase.as_str()),
            None => GuardrailResult::pass(&self.name, self.severity),
        }
    }
}

/// Fails when the payload exceeds a character budget.
#[derive(Debug, Clone, Copy)]
pub struct MaxLengthGuardrail {
    max_chars: usize,
    severity: Severity,
}

impl MaxLengthGuardrail {
    /// Creates a length check.
    ///
    /// # Errors
    ///
    /// Returns [`GuardrailError::InvalidGuardrail`] if `max_chars` is zero.
    pub fn new(max_chars: usize, severity: Severity) -> PolicyResult<Self> {
        if max_chars == 0 {
            return Err(GuardrailError::invalid("max_chars must be positive"));
        }
        Ok(Self {
            max_chars,
            severity,
        })
    }
}

#[async_trait]
impl Guardrail for MaxLengthGuardrail {
    fn name(&self) -> &str {
        "max_length"
    }

    async fn check(&self, payload: &str) -> GuardrailResult {
        let length = payload.chars().count();
        if length <= self.max_chars {
            return GuardrailResult::pass(self.name(), self.severity);
        }
        GuardrailResult::fail(
            self.name(),
            self.severity,
            format!("payload has {length} characters, limit is {}", self.max_chars),
        )
        .with_metadata("length", length)
    }
}

/// Wraps a synchronous predicate; `Err` carries the failure reason.
pub struct FnGuardrail<F> {
    name: String,
    severity: Severity,
    check: F,
}

impl<F> fmt::Debug for FnGuardrail<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnGuardrail")
            .field("name", &self.name)
            .field("severity", &self.severity)
            .finish_non_exhaustive()
    }
}

impl<F> FnGuardrail<F>
where
    F: Fn(&str) -> Result<(), String> + Send + Sync,
{
    /// Creates a check from a predicate.
    #[must_use]
    pub fn new(name: impl Into<String>, severity: Severity, check: F) -> Self {
        Self {
            name: name.into(),
            severity,
            check,
        }
    }
}

#[async_trait]
impl<F> Guardrail for FnGuardrail<F>
where
    F: Fn(&str) -> Result<(), String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, payload: &str) -> GuardrailResult {
        match (self.check)(payload) {
            Ok(()) => GuardrailResult::pass(&self.name, self.severity),
            Err(reason) => GuardrailResult::fail(&self.name, self.severity, reason),
        }
    }
}
