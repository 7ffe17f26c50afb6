//! Tracing subscriber installation for binaries.
//!
//! Library crates only emit `tracing` events; processes that want to see them
//! call [`init_tracing`] (or [`TracingConfig::init`]) once at startup.

#![warn(missing_docs, clippy::pedantic)]

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Directive used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The fallback filter directive could not be parsed.
    #[error("invalid filter directive `{directive}`: {reason}")]
    InvalidDirective {
        /// Offending directive.
        directive: String,
        /// Parser message.
        reason: String,
    },
    /// A global subscriber is already installed.
    #[error("tracing subscriber already installed: {reason}")]
    AlreadyInstalled {
        /// Message from `tracing-subscriber`.
        reason: String,
    },
}

/// Formatting options for the `fmt` subscriber.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    default_directive: String,
    with_target: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_directive: DEFAULT_DIRECTIVE.to_owned(),
            with_target: false,
        }
    }
}

impl TracingConfig {
    /// Sets the directive used when `RUST_LOG` is not set.
    #[must_use]
    pub fn with_default_directive(mut self, directive: impl Into<String>) -> Self {
        self.default_directive = directive.into();
        self
    }

    /// Includes event targets (module paths) in the output.
    #[must_use]
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    /// Builds the filter: `RUST_LOG` when valid, otherwise the default
    /// directive.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::InvalidDirective`] if the default directive
    /// does not parse.
    pub fn filter(&self) -> Result<EnvFilter, TelemetryError> {
        EnvFilter::try_from_default_env().or_else(|_| {
            EnvFilter::try_new(&self.default_directive).map_err(|err| {
                TelemetryError::InvalidDirective {
                    directive: self.default_directive.clone(),
                    reason: err.to_string(),
                }
            })
        })
    }

    /// Installs the global `fmt` subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError`] if the filter is invalid or a subscriber is
    /// already installed.
    pub fn init(&self) -> Result<(), TelemetryError> {
        tracing_subscriber::fmt()
            .with_env_filter(self.filter()?)
            .with_target(self.with_target)
            .with_level(true)
            .try_init()
            .map_err(|err| TelemetryError::AlreadyInstalled {
                reason: err.to_string(),
            })
    }
}

/// Installs the global subscriber with default options.
///
/// # Errors
///
/// See [`TracingConfig::init`].
pub fn init_tracing() -> Result<(), TelemetryError> {
    TracingConfig::default().init()
}
