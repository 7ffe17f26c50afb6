//! Explicitly owned task and note storage for assistant-style agents.
//!
//! A [`WorkspaceStore`] is created by the caller and handed to
//! [`assistant_tools`], which binds it into tool handlers. Nothing here is
//! global: two stores never share state, and dropping the last `Arc` drops
//! the data.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod store;
mod tools;

pub use error::{StoreError, StoreResult};
pub use store::{DailySummary, Note, Priority, RECENT_NOTES, Task, TaskStatus, WorkspaceStore};
pub use tools::assistant_tools;
