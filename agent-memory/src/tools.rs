//! Tool bindings that expose a [`WorkspaceStore`] to an agent.

use std::fmt::Write as _;
use std::sync::Arc;

use agent_tools::registry::{ToolBinding, ToolError, ToolMetadata, ToolResult};
use agent_tools::schema;
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::StoreError;
use crate::store::{Priority, TaskStatus, WorkspaceStore};

const PREVIEW_CHARS: usize = 50;

#[derive(Deserialize)]
struct AddTaskArgs {
    title: String,
    due_date: Option<String>,
    priority: Option<String>,
}

#[derive(Deserialize)]
struct CompleteTaskArgs {
    task_id: String,
}

#[derive(Deserialize)]
struct ListTasksArgs {
    status: Option<String>,
    priority: Option<String>,
}

#[derive(Deserialize)]
struct TakeNoteArgs {
    content: String,
}

/// Returns the assistant tool set bound to `store`: `add_task`,
/// `complete_task`, `list_tasks`, `take_note`, `list_notes` and
/// `daily_summary`.
///
/// # Errors
///
/// Only fails if a built-in tool name is rejected, which indicates a bug.
pub fn assistant_tools(store: &Arc<WorkspaceStore>) -> ToolResult<Vec<ToolBinding>> {
    Ok(vec![
        add_task(Arc::clone(store))?,
        complete_task(Arc::clone(store))?,
        list_tasks(Arc::clone(store))?,
        take_note(Arc::clone(store))?,
        list_notes(Arc::clone(store))?,
        daily_summary(Arc::clone(store))?,
    ])
}

fn add_task(store: Arc<WorkspaceStore>) -> ToolResult<ToolBinding> {
    let metadata = ToolMetadata::new("add_task")?
        .with_description("Add a new task to the task list.")
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "title": {"type": "string", "description": "The task description"},
                "due_date": {"type": "string", "description": "Optional due date (YYYY-MM-DD)"},
                "priority": {"type": "string", "enum": ["low", "medium", "high"]},
            },
            "required": ["title"],
        }));

    Ok(ToolBinding::new(metadata, move |input: Value| {
        let store = Arc::clone(&store);
        async move {
            let args: AddTaskArgs = parse(input)?;
            let due_date = args.due_date.as_deref().map(parse_date).transpose().map_err(rejected)?;
            let priority = args
                .priority
                .as_deref()
                .map(str::parse::<Priority>)
                .transpose()
                .map_err(rejected)?
                .unwrap_or_default();

            let task = store
                .add_task(args.title, due_date, priority)
                .await
                .map_err(rejected)?;
            let due = task
                .due_date
                .map(|due| format!(" (due: {due})"))
                .unwrap_or_default();
            Ok::<_, ToolError>(format!(
                "Added task {}: '{}'{due} [{} priority]",
                task.id, task.title, task.priority
            ))
        }
    }))
}

fn complete_task(store: Arc<WorkspaceStore>) -> ToolResult<ToolBinding> {
    let metadata = ToolMetadata::new("complete_task")?
        .with_description("Mark a task as completed.")
        .with_parameters(schema::object(
            &[("task_id", "string", "The ID of the task to complete")],
            &[],
        ));

    Ok(ToolBinding::new(metadata, move |input: Value| {
        let store = Arc::clone(&store);
        async move {
            let args: CompleteTaskArgs = parse(input)?;
            let task = store.complete_task(&args.task_id).await.map_err(rejected)?;
            Ok::<_, ToolError>(format!("Completed: '{}'", task.title))
        }
    }))
}

fn list_tasks(store: Arc<WorkspaceStore>) -> ToolResult<ToolBinding> {
    let metadata = ToolMetadata::new("list_tasks")?
        .with_description("List tasks with optional filtering.")
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "status": {"type": "string", "enum": ["all", "pending", "completed"]},
                "priority": {"type": "string", "enum": ["all", "low", "medium", "high"]},
            },
        }));

    Ok(ToolBinding::new(metadata, move |input: Value| {
        let store = Arc::clone(&store);
        async move {
            let args: ListTasksArgs = parse(input)?;
            let status = filter::<TaskStatus>(args.status.as_deref())?;
            let priority = filter::<Priority>(args.priority.as_deref())?;

            let tasks = store.list_tasks(status, priority).await;
            if tasks.is_empty() {
                return Ok("No tasks found matching criteria.".to_owned());
            }
            let mut text = String::from("Tasks:");
            for task in tasks {
                let _ = write!(text, "\n  {task}");
            }
            Ok::<_, ToolError>(text)
        }
    }))
}

fn take_note(store: Arc<WorkspaceStore>) -> ToolResult<ToolBinding> {
    let metadata = ToolMetadata::new("take_note")?
        .with_description("Save a quick note.")
        .with_parameters(schema::object(&[("content", "string", "The note content")], &[]));

    Ok(ToolBinding::new(metadata, move |input: Value| {
        let store = Arc::clone(&store);
        async move {
            let args: TakeNoteArgs = parse(input)?;
            let note = store.take_note(args.content).await.map_err(rejected)?;
            Ok::<_, ToolError>(format!("Note saved as {}: '{}'", note.id, preview(&note.content)))
        }
    }))
}

fn list_notes(store: Arc<WorkspaceStore>) -> ToolResult<ToolBinding> {
    let metadata = ToolMetadata::new("list_notes")?
        .with_description("List the most recent notes.");

    Ok(ToolBinding::new(metadata, move |_: Value| {
        let store = Arc::clone(&store);
        async move {
            let notes = store.list_notes().await;
            if notes.is_empty() {
                return Ok::<_, ToolError>("No notes found.".to_owned());
            }
            let mut text = String::from("Notes:");
            for note in notes {
                let _ = write!(text, "\n  - [{}] {}", note.id, preview(&note.content));
            }
            Ok(text)
        }
    }))
}

fn daily_summary(store: Arc<WorkspaceStore>) -> ToolResult<ToolBinding> {
    let metadata = ToolMetadata::new("daily_summary")?
        .with_description("Summarise today's pending, due, and high-priority tasks.");

    Ok(ToolBinding::new(metadata, move |_: Value| {
        let store = Arc::clone(&store);
        async move {
            let summary = store.summary(Local::now().date_naive()).await;
            Ok::<_, ToolError>(summary.to_string())
        }
    }))
}

fn parse<T: DeserializeOwned>(input: Value) -> ToolResult<T> {
    serde_json::from_value(input).map_err(|err| ToolError::execution(err.to_string()))
}

fn parse_date(value: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| StoreError::invalid("due_date", value, "expected YYYY-MM-DD"))
}

fn filter<T>(value: Option<&str>) -> ToolResult<Option<T>>
where
    T: std::str::FromStr<Err = StoreError>,
{
    match value {
        None | Some("all") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(rejected),
    }
}

fn rejected(err: StoreError) -> ToolError {
    ToolError::execution(err.to_string())
}

fn preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_CHARS {
        let head: String = content.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        content.to_owned()
    }
}
