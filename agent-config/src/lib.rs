//! Run configuration for the orchestration runtime.
//!
//! [`RunConfig`] bounds a single run: how many model turns it may take, how
//! long each gateway call and tool handler may block, and how many fan-out
//! branches may execute at once. Values come from code, a TOML document, or
//! `AGENT_*` environment variables.

#![warn(missing_docs, clippy::pedantic)]

mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load, load_or_default};
pub use schema::RunConfig;
