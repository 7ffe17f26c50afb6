//! Strongly typed run configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};

const DEFAULT_MAX_TURNS: usize = 10;
const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_PARALLEL_RUNS: usize = 32;

/// Limits applied to every run started by a runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    max_turns: usize,
    model_timeout: Duration,
    tool_timeout: Duration,
    run_timeout: Option<Duration>,
    max_parallel_runs: usize,
    parallel_tool_calls: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            run_timeout: None,
            max_parallel_runs: DEFAULT_MAX_PARALLEL_RUNS,
            parallel_tool_calls: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Document {
    #[serde(default)]
    run: RunSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RunSection {
    max_turns: Option<usize>,
    model_timeout_ms: Option<u64>,
    tool_timeout_ms: Option<u64>,
    run_timeout_ms: Option<u64>,
    max_parallel_runs: Option<usize>,
    parallel_tool_calls: Option<bool>,
}

impl RunConfig {
    /// Sets the maximum number of model turns per run.
    #[must_use]
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Sets the deadline for a single gateway call.
    #[must_use]
    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    /// Sets the deadline for a single tool handler.
    #[must_use]
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Sets an optional deadline for a whole run.
    #[must_use]
    pub fn with_run_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// Sets how many fan-out branches may execute at once.
    #[must_use]
    pub fn with_max_parallel_runs(mut self, limit: usize) -> Self {
        self.max_parallel_runs = limit;
        self
    }

    /// Enables or disables concurrent execution of one turn's tool calls.
    #[must_use]
    pub fn with_parallel_tool_calls(mut self, enabled: bool) -> Self {
        self.parallel_tool_calls = enabled;
        self
    }

    /// Maximum number of model turns per run.
    #[must_use]
    pub const fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Deadline for a single gateway call.
    #[must_use]
    pub const fn model_timeout(&self) -> Duration {
        self.model_timeout
    }

    /// Deadline for a single tool handler.
    #[must_use]
    pub const fn tool_timeout(&self) -> Duration {
        self.tool_timeout
    }

    /// Deadline for a whole run, if any.
    #[must_use]
    pub const fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout
    }

    /// Bound on concurrently executing fan-out branches.
    #[must_use]
    pub const fn max_parallel_runs(&self) -> usize {
        self.max_parallel_runs
    }

    /// Whether one turn's tool calls run concurrently.
    #[must_use]
    pub const fn parallel_tool_calls(&self) -> bool {
        self.parallel_tool_calls
    }

    /// Checks that every limit is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero turn limit, a zero
    /// parallelism bound, or a zero timeout.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_turns == 0 {
            return Err(invalid("max_turns", "must be at least 1"));
        }
        if self.max_parallel_runs == 0 {
            return Err(invalid("max_parallel_runs", "must be at least 1"));
        }
        if self.model_timeout.is_zero() {
            return Err(invalid("model_timeout", "must be non-zero"));
        }
        if self.tool_timeout.is_zero() {
            return Err(invalid("tool_timeout", "must be non-zero"));
        }
        if self.run_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(invalid("run_timeout", "must be non-zero when set"));
        }
        Ok(())
    }

    /// Parses a TOML document with an optional `[run]` table on top of the
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::Invalid`] when the result fails validation.
    pub fn from_toml_str(document: &str) -> ConfigResult<Self> {
        let Document { run } = toml::from_str::<Document>(document)?;
        let mut config = Self::default();

        if let Some(value) = run.max_turns {
            config.max_turns = value;
        }
        if let Some(value) = run.model_timeout_ms {
            config.model_timeout = Duration::from_millis(value);
        }
        if let Some(value) = run.tool_timeout_ms {
            config.tool_timeout = Duration::from_millis(value);
        }
        if let Some(value) = run.run_timeout_ms {
            config.run_timeout = Some(Duration::from_millis(value));
        }
        if let Some(value) = run.max_parallel_runs {
            config.max_parallel_runs = value;
        }
        if let Some(value) = run.parallel_tool_calls {
            config.parallel_tool_calls = value;
        }

        config.validate()?;
        Ok(config)
    }

    /// Applies `AGENT_*` overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] when a variable is set but not a valid
    /// unsigned integer.
    pub fn apply_env(self) -> ConfigResult<Self> {
        self.apply_env_from(|var| std::env::var(var).ok())
    }

    /// Applies `AGENT_*` overrides resolved through `lookup`.
    ///
    /// Recognised variables: `AGENT_MAX_TURNS`, `AGENT_MODEL_TIMEOUT_MS`,
    /// `AGENT_TOOL_TIMEOUT_MS`, `AGENT_RUN_TIMEOUT_MS`,
    /// `AGENT_MAX_PARALLEL_RUNS`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] when a variable is set but not a valid
    /// unsigned integer.
    pub fn apply_env_from<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = env_number::<usize>(&lookup, "AGENT_MAX_TURNS")? {
            self.max_turns = value;
        }
        if let Some(value) = env_number::<u64>(&lookup, "AGENT_MODEL_TIMEOUT_MS")? {
            self.model_timeout = Duration::from_millis(value);
        }
        if let Some(value) = env_number::<u64>(&lookup, "AGENT_TOOL_TIMEOUT_MS")? {
            self.tool_timeout = Duration::from_millis(value);
        }
        if let Some(value) = env_number::<u64>(&lookup, "AGENT_RUN_TIMEOUT_MS")? {
            self.run_timeout = Some(Duration::from_millis(value));
        }
        if let Some(value) = env_number::<usize>(&lookup, "AGENT_MAX_PARALLEL_RUNS")? {
            self.max_parallel_runs = value;
        }
        Ok(self)
    }
}

fn invalid(field: &'static str, reason: &'static str) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

fn env_number<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> ConfigResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|err| ConfigError::Env {
            var,
            reason: err.to_string(),
            value: raw,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let config = RunConfig::default();
        assert_eq!(config.max_turns(), 10);
        assert_eq!(config.model_timeout(), Duration::from_secs(60));
        assert_eq!(config.run_timeout(), None);
        assert!(config.parallel_tool_calls());
        config.validate().unwrap();
    }

    #[test]
    fn validation_rejects_zero_limits() {
        let err = RunConfig::default().with_max_turns(0).validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "max_turns", .. }));

        let err = RunConfig::default()
            .with_tool_timeout(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "tool_timeout", .. }));

        assert!(
            RunConfig::default()
                .with_run_timeout(Some(Duration::ZERO))
                .validate()
                .is_err()
        );
    }

    #[test]
    fn parses_run_table() {
        let config = RunConfig::from_toml_str(
            r"
            [run]
            max_turns = 4
            model_timeout_ms = 1500
            run_timeout_ms = 10000
            parallel_tool_calls = false
            ",
        )
        .unwrap();

        assert_eq!(config.max_turns(), 4);
        assert_eq!(config.model_timeout(), Duration::from_millis(1500));
        assert_eq!(config.tool_timeout(), Duration::from_secs(30));
        assert_eq!(config.run_timeout(), Some(Duration::from_secs(10)));
        assert!(!config.parallel_tool_calls());
    }

    #[test]
    fn empty_document_uses_defaults() {
        assert_eq!(RunConfig::from_toml_str("").unwrap(), RunConfig::default());
    }

    #[test]
    fn rejects_unknown_keys_and_invalid_values() {
        let err = RunConfig::from_toml_str("[run]\nmax_turn = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let err = RunConfig::from_toml_str("[run]\nmax_turns = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("AGENT_MAX_TURNS", "3"),
            ("AGENT_TOOL_TIMEOUT_MS", " 250 "),
            ("AGENT_MAX_PARALLEL_RUNS", "2"),
        ]
        .into_iter()
        .collect();

        let config = RunConfig::default()
            .apply_env_from(|var| vars.get(var).map(|value| (*value).to_owned()))
            .unwrap();
        assert_eq!(config.max_turns(), 3);
        assert_eq!(config.tool_timeout(), Duration::from_millis(250));
        assert_eq!(config.max_parallel_runs(), 2);
        assert_eq!(config.model_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn malformed_env_value_errors() {
        let err = RunConfig::default()
            .apply_env_from(|var| (var == "AGENT_MAX_TURNS").then(|| "many".to_owned()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "AGENT_MAX_TURNS", .. }));
    }
}
