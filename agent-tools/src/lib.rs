//! Tool registration, argument validation, and invocation.
//!
//! Tools are registered per agent with a JSON schema describing their
//! arguments. Invocation validates the arguments first and converts every
//! handler failure (error, panic, timeout, cancellation) into a [`ToolError`]
//! value so the caller can feed it back to the model.
//!
//! [`ToolError`]: registry::ToolError

#![warn(missing_docs, clippy::pedantic)]

pub mod context;
pub mod registry;
pub mod schema;
