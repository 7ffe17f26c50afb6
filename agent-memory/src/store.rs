//! In-process task and note store shared by assistant tools.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Number of notes returned by [`WorkspaceStore::list_notes`].
pub const RECENT_NOTES: usize = 10;

/// Task urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Can wait.
    Low,
    /// Default.
    #[default]
    Medium,
    /// Needs attention first.
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

impl FromStr for Priority {
    type Err = StoreError;

    fn from_str(value: &str) -> StoreResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(StoreError::invalid("priority", value, "expected low, medium or high")),
        }
    }
}

/// Task progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Not done yet.
    #[default]
    Pending,
    /// Done.
    Completed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        })
    }
}

impl FromStr for TaskStatus {
    type Err = StoreError;

    fn from_str(value: &str) -> StoreResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            _ => Err(StoreError::invalid("status", value, "expected pending or completed")),
        }
    }
}

/// A to-do item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Identifier of the form `task_N`.
    pub id: String,
    /// What needs doing.
    pub title: String,
    /// Optional due date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Urgency.
    pub priority: Priority,
    /// Progress.
    pub status: TaskStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = match self.status {
            TaskStatus::Pending => "[ ]",
            TaskStatus::Completed => "[x]",
        };
        write!(f, "{mark} [{}] {} ({})", self.id, self.title, self.priority)?;
        if let Some(due) = self.due_date {
            write!(f, " due {due}")?;
        }
        Ok(())
    }
}

/// A free-form note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Identifier of the form `note_N`.
    pub id: String,
    /// Note text.
    pub content: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Snapshot of the store for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    /// Day the summary was computed for.
    pub date: NaiveDate,
    /// Number of pending tasks.
    pub pending: usize,
    /// Pending tasks due on `date`.
    pub due_today: Vec<Task>,
    /// Pending high-priority tasks.
    pub high_priority: Vec<Task>,
    /// Number of completed tasks.
    pub completed: usize,
}

impl fmt::Display for DailySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Daily summary for {}", self.date)?;
        writeln!(f, "  pending: {}", self.pending)?;
        writeln!(f, "  due today: {}", self.due_today.len())?;
        writeln!(f, "  high priority: {}", self.high_priority.len())?;
        write!(f, "  completed: {}", self.completed)?;
        let sections = [
            ("Due today", &self.due_today),
            ("High priority", &self.high_priority),
        ];
        for (heading, tasks) in sections {
            if !tasks.is_empty() {
                write!(f, "\n{heading}:")?;
                for task in tasks {
                    write!(f, "\n  - {}", task.title)?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Inner {
    tasks: Vec<Task>,
    notes: Vec<Note>,
}

/// Tasks and notes owned by whoever constructs the store.
///
/// Share it between tools through `Arc<WorkspaceStore>`; every method takes
/// `&self` and synchronises internally.
#[derive(Debug, Default)]
pub struct WorkspaceStore {
    inner: RwLock<Inner>,
}

impl WorkspaceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pending task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Empty`] when `title` is blank.
    pub async fn add_task(
        &self,
        title: impl Into<String>,
        due_date: Option<NaiveDate>,
        priority: Priority,
    ) -> StoreResult<Task> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(StoreError::Empty { field: "title" });
        }

        let mut inner = self.inner.write().await;
        let task = Task {
            id: format!("task_{}", inner.tasks.len() + 1),
            title,
            due_date,
            priority,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
        };
        inner.tasks.push(task.clone());
        debug!(task = %task.id, %priority, "task added");
        Ok(task)
    }

    /// Marks a task completed. Completing a completed task is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownTask`] when no task has `id`.
    pub async fn complete_task(&self, id: &str) -> StoreResult<Task> {
        let mut inner = self.inner.write().await;
        let task = inner
            .tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| StoreError::UnknownTask { id: id.to_owned() })?;
        task.status = TaskStatus::Completed;
        debug!(task = %task.id, "task completed");
        Ok(task.clone())
    }

    /// Lists tasks in creation order, optionally filtered.
    pub async fn list_tasks(
        &self,
        status: Option<TaskStatus>,
        priority: Option<Priority>,
    ) -> Vec<Task> {
        self.inner
            .read()
            .await
            .tasks
            .iter()
            .filter(|task| status.is_none_or(|status| task.status == status))
            .filter(|task| priority.is_none_or(|priority| task.priority == priority))
            .cloned()
            .collect()
    }

    /// Saves a note.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Empty`] when `content` is blank.
    pub async fn take_note(&self, content: impl Into<String>) -> StoreResult<Note> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(StoreError::Empty { field: "content" });
        }

        let mut inner = self.inner.write().await;
        let note = Note {
            id: format!("note_{}", inner.notes.len() + 1),
            content,
            created_at: Utc::now(),
        };
        inner.notes.push(note.clone());
        Ok(note)
    }

    /// Returns the most recent notes, oldest first.
    pub async fn list_notes(&self) -> Vec<Note> {
        let inner = self.inner.read().await;
        let skip = inner.notes.len().saturating_sub(RECENT_NOTES);
        inner.notes[skip..].to_vec()
    }

    /// Summarises pending work as of `today`.
    pub async fn summary(&self, today: NaiveDate) -> DailySummary {
        let inner = self.inner.read().await;
        let pending: Vec<&Task> = inner
            .tasks
            .iter()
            .filter(|task| task.status == TaskStatus::Pending)
            .collect();

        DailySummary {
            date: today,
            pending: pending.len(),
            due_today: pending
                .iter()
                .filter(|task| task.due_date == Some(today))
                .map(|task| (*task).clone())
                .collect(),
            high_priority: pending
                .iter()
                .filter(|task| task.priority == Priority::High)
                .map(|task| (*task).clone())
                .collect(),
            completed: inner.tasks.len() - pending.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(text: &str) -> NaiveDate {
        text.parse().unwrap()
    }

    #[tokio::test]
    async fn task_lifecycle() {
        let store = WorkspaceStore::new();
        let first = store
            .add_task("file taxes", Some(day("2026-04-15")), Priority::High)
            .await
            .unwrap();
        let second = store.add_task("water plants", None, Priority::Low).await.unwrap();
        assert_eq!(first.id, "task_1");
        assert_eq!(second.id, "task_2");

        store.complete_task("task_2").await.unwrap();
        assert_eq!(
            store.complete_task("task_9").await.unwrap_err(),
            StoreError::UnknownTask { id: "task_9".into() }
        );

        let pending = store.list_tasks(Some(TaskStatus::Pending), None).await;
        assert_eq!(pending, [first.clone()]);
        let low = store.list_tasks(None, Some(Priority::Low)).await;
        assert_eq!(low[0].status, TaskStatus::Completed);
        assert_eq!(store.list_tasks(None, None).await.len(), 2);

        let summary = store.summary(day("2026-04-15")).await;
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.due_today, [first.clone()]);
        assert_eq!(summary.high_priority, [first]);
        assert!(summary.to_string().contains("Due today:\n  - file taxes"));
    }

    #[tokio::test]
    async fn notes_keep_the_latest_ten() {
        let store = WorkspaceStore::new();
        for n in 1..=12 {
            store.take_note(format!("note {n}")).await.unwrap();
        }
        let notes = store.list_notes().await;
        assert_eq!(notes.len(), RECENT_NOTES);
        assert_eq!(notes[0].id, "note_3");
        assert_eq!(notes[9].content, "note 12");

        assert_eq!(
            store.take_note("  ").await.unwrap_err(),
            StoreError::Empty { field: "content" }
        );
    }

    #[test]
    fn parses_priority_and_status() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("completed".parse::<TaskStatus>().unwrap(), TaskStatus::Completed);
        assert!(matches!(
            "urgent".parse::<Priority>(),
            Err(StoreError::InvalidValue { field: "priority", .. })
        ));
    }
}
