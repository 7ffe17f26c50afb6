//! Model gateway boundary used by agents.
//!
//! The runtime treats the model backend as a black box behind
//! [`traits::ModelGateway`]: a transcript and tool/handoff declarations go in,
//! a structured decision comes out. The wrappers in this crate add concurrency
//! limits and transient-failure retry around any gateway implementation.

#![warn(missing_docs, clippy::pedantic)]

pub mod limited;
pub mod retry;
pub mod scripted;
pub mod traits;
