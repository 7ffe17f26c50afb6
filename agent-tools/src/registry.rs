//! Runtime registry for tool metadata and execution.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use agent_primitives::ToolName;
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::context::ToolContext;
use crate::schema::{self, ArgumentSchema};

/// Result alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Distinguishes plain function tools from nested agent runs.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Handler is ordinary code.
    #[default]
    Function,
    /// Handler runs a full turn executor on a bound sub-agent.
    AgentAsTool,
}

/// Metadata describing a registered tool.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolMetadata {
    name: ToolName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    parameters: Value,
    #[serde(default)]
    kind: ToolKind,
}

impl ToolMetadata {
    /// Creates metadata for a tool accepting any JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidMetadata`] if the name is not a valid tool
    /// identifier.
    pub fn new(name: impl Into<String>) -> ToolResult<Self> {
        let name = ToolName::new(name).map_err(|err| ToolError::InvalidMetadata {
            reason: err.to_string(),
        })?;

        Ok(Self {
            name,
            description: None,
            parameters: schema::any_object(),
            kind: ToolKind::Function,
        })
    }

    /// Sets the human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the JSON schema the arguments must satisfy.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Marks the tool kind.
    #[must_use]
    pub fn with_kind(mut self, kind: ToolKind) -> Self {
        self.kind = kind;
        self
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &ToolName {
        &self.name
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the declared argument schema.
    #[must_use]
    pub fn parameters(&self) -> &Value {
        &self.parameters
    }

    /// Returns the tool kind.
    #[must_use]
    pub const fn kind(&self) -> ToolKind {
        self.kind
    }
}

/// Value returned by a tool handler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOutput {
    /// Plain text.
    Text(String),
    /// Structured data, rendered as compact JSON for the model.
    Json(Value),
}

impl ToolOutput {
    /// Renders the output as transcript text.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Json(value) => value.to_string(),
        }
    }
}

impl fmt::Display for ToolOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Json(value) => write!(f, "{value}"),
        }
    }
}

impl From<String> for ToolOutput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for ToolOutput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Trait implemented by tool executors.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Invokes the tool with already validated JSON arguments.
    async fn invoke(&self, ctx: &ToolContext, input: Value) -> ToolResult<ToolOutput>;
}

#[async_trait]
impl<F, Fut, O> Tool for F
where
    F: Send + Sync + Fn(Value) -> Fut,
    Fut: Future<Output = ToolResult<O>> + Send,
    O: Into<ToolOutput> + Send,
{
    async fn invoke(&self, _ctx: &ToolContext, input: Value) -> ToolResult<ToolOutput> {
        (self)(input).await.map(Into::into)
    }
}

/// Metadata paired with an executor, ready to be registered.
#[derive(Clone)]
pub struct ToolBinding {
    metadata: ToolMetadata,
    executor: Arc<dyn Tool>,
}

impl fmt::Debug for ToolBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolBinding")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl ToolBinding {
    /// Creates a new tool binding from metadata and an executor.
    #[must_use]
    pub fn new<T>(metadata: ToolMetadata, executor: T) -> Self
    where
        T: Tool + 'static,
    {
        Self {
            metadata,
            executor: Arc::new(executor),
        }
    }

    /// Returns the metadata associated with this binding.
    #[must_use]
    pub fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    /// Registers the binding with the provided registry.
    ///
    /// # Errors
    ///
    /// Propagates [`ToolError::DuplicateTool`] if a tool with the same name
    /// has already been registered, or [`ToolError::InvalidMetadata`] if the
    /// argument schema does not compile.
    pub fn register(self, registry: &mut ToolRegistry) -> ToolResult<()> {
        let ToolBinding { metadata, executor } = self;
        registry.insert(metadata, executor)
    }
}

/// Handle returned by the registry for direct invocation.
#[derive(Clone)]
pub struct ToolHandle {
    metadata: ToolMetadata,
    schema: Arc<ArgumentSchema>,
    executor: Arc<dyn Tool>,
}

impl fmt::Debug for ToolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolHandle")
            .field("name", &self.metadata.name)
            .field("kind", &self.metadata.kind)
            .finish_non_exhaustive()
    }
}

impl ToolHandle {
    /// Returns the associated metadata.
    #[must_use]
    pub fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    /// Validates `input` against the declared schema without running the
    /// handler.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] on a schema mismatch.
    pub fn validate(&self, input: &Value) -> ToolResult<()> {
        self.schema.validate(self.metadata.name.as_str(), input)
    }

    /// Validates the arguments and executes the handler.
    ///
    /// Handler errors, panics, an elapsed `timeout`, and cancellation of the
    /// context token are all returned as [`ToolError`] values; none of them
    /// unwind into the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] without running the handler
    /// when validation fails, otherwise whichever failure the handler hit.
    pub async fn invoke(
        &self,
        ctx: &ToolContext,
        input: Value,
        timeout: Option<Duration>,
    ) -> ToolResult<ToolOutput> {
        self.validate(&input)?;

        let tool = self.metadata.name.as_str();
        debug!(tool, call_id = %ctx.call_id(), "invoking tool");

        let guarded = async {
            let call = AssertUnwindSafe(self.executor.invoke(ctx, input)).catch_unwind();
            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        return Err(ToolError::TimedOut {
                            tool: tool.to_owned(),
                            after: limit,
                        });
                    }
                },
                None => call.await,
            };
            outcome.unwrap_or_else(|panic| {
                Err(ToolError::Panicked {
                    tool: tool.to_owned(),
                    reason: panic_message(panic.as_ref()),
                })
            })
        };

        let result = tokio::select! {
            biased;
            () = ctx.cancellation().cancelled() => Err(ToolError::Cancelled {
                tool: tool.to_owned(),
            }),
            result = guarded => result,
        };

        if let Err(err) = &result {
            warn!(tool, call_id = %ctx.call_id(), error = %err, "tool invocation failed");
        }
        result
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_owned()
    }
}

/// Ordered set of tools keyed by name.
///
/// Registration happens while an agent is being built; afterwards the
/// registry is only read, so it carries no interior locking.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolHandle>,
    index: HashMap<String, usize>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self
            .tools
            .iter()
            .map(|handle| handle.metadata.name.as_str())
            .collect();
        f.debug_struct("ToolRegistry")
            .field("registered", &names)
            .finish()
    }
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool implementation.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] if the name is already present or
    /// [`ToolError::InvalidMetadata`] if the argument schema does not compile.
    pub fn register_tool<T>(&mut self, metadata: ToolMetadata, tool: T) -> ToolResult<()>
    where
        T: Tool + 'static,
    {
        self.insert(metadata, Arc::new(tool))
    }

    /// Registers a prepared binding.
    ///
    /// # Errors
    ///
    /// Same as [`ToolRegistry::register_tool`].
    pub fn register_binding(&mut self, binding: ToolBinding) -> ToolResult<()> {
        binding.register(self)
    }

    fn insert(&mut self, metadata: ToolMetadata, executor: Arc<dyn Tool>) -> ToolResult<()> {
        let name = metadata.name.as_str().to_owned();
        if self.index.contains_key(&name) {
            return Err(ToolError::DuplicateTool { name });
        }

        let schema = ArgumentSchema::compile(&metadata.parameters)?;
        self.index.insert(name, self.tools.len());
        self.tools.push(ToolHandle {
            metadata,
            schema: Arc::new(schema),
            executor,
        });
        Ok(())
    }

    /// Returns a handle to the tool matching the supplied name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolHandle> {
        self.index.get(name).map(|&position| &self.tools[position])
    }

    /// Returns `true` when no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Invokes a registered tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] when the tool is not found, or any
    /// error produced by [`ToolHandle::invoke`].
    pub async fn invoke(
        &self,
        name: &str,
        ctx: &ToolContext,
        input: Value,
        timeout: Option<Duration>,
    ) -> ToolResult<ToolOutput> {
        let handle = self.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_owned(),
        })?;
        handle.invoke(ctx, input, timeout).await
    }

    /// Lists the metadata of all registered tools in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<ToolMetadata> {
        self.tools
            .iter()
            .map(|handle| handle.metadata.clone())
            .collect()
    }
}

/// Coarse classification reported back to the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// Registration-time failure; never produced by invocation.
    Registration,
    /// The model asked for a tool the agent does not have.
    UnknownTool,
    /// Arguments did not match the declared schema.
    InvalidArguments,
    /// The handler failed, panicked, timed out, or was cancelled.
    HandlerFailure,
}

/// Errors produced by tool registration and invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool metadata failed validation.
    #[error("invalid tool metadata: {reason}")]
    InvalidMetadata {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Tool name collided with an existing registration.
    #[error("tool `{name}` is already registered")]
    DuplicateTool {
        /// Name of the offending tool.
        name: String,
    },

    /// Requested tool does not exist.
    #[error("tool `{name}` is not registered")]
    UnknownTool {
        /// Name of the missing tool.
        name: String,
    },

    /// Arguments did not satisfy the declared schema.
    #[error("invalid arguments for tool `{tool}`: {reason}")]
    InvalidArguments {
        /// Tool whose schema was violated.
        tool: String,
        /// Schema violations.
        reason: String,
    },

    /// Tool execution failed.
    #[error("tool execution failed: {reason}")]
    Execution {
        /// Human-readable error returned by the tool implementation.
        reason: String,
    },

    /// Handler did not finish in time.
    #[error("tool `{tool}` timed out after {after:?}")]
    TimedOut {
        /// Tool that timed out.
        tool: String,
        /// Deadline that elapsed.
        after: Duration,
    },

    /// Handler panicked.
    #[error("tool `{tool}` panicked: {reason}")]
    Panicked {
        /// Tool that panicked.
        tool: String,
        /// Panic payload, when it was a string.
        reason: String,
    },

    /// The owning run was cancelled while the handler ran.
    #[error("tool `{tool}` was cancelled")]
    Cancelled {
        /// Tool that was cancelled.
        tool: String,
    },
}

impl ToolError {
    /// Creates an execution error from the supplied reason.
    #[must_use]
    pub fn execution(reason: impl Into<String>) -> Self {
        Self::Execution {
            reason: reason.into(),
        }
    }

    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ToolErrorKind {
        match self {
            Self::InvalidMetadata { .. } | Self::DuplicateTool { .. } => {
                ToolErrorKind::Registration
            }
            Self::UnknownTool { .. } => ToolErrorKind::UnknownTool,
            Self::InvalidArguments { .. } => ToolErrorKind::InvalidArguments,
            Self::Execution { .. }
            | Self::TimedOut { .. }
            | Self::Panicked { .. }
            | Self::Cancelled { .. } => ToolErrorKind::HandlerFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use agent_primitives::{AgentName, CallId, RunId};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> ToolContext {
        ToolContext::new(
            RunId::random(),
            AgentName::new("tester").unwrap(),
            CallId::from("call_1"),
        )
    }

    fn echo_metadata() -> ToolMetadata {
        ToolMetadata::new("echo")
            .unwrap()
            .with_description("Echo incoming payload")
            .with_parameters(schema::object(&[("message", "string", "Text to echo")], &[]))
    }

    #[tokio::test]
    async fn register_and_invoke_tool() {
        let mut registry = ToolRegistry::new();
        registry
            .register_tool(echo_metadata(), |input: Value| async move { Ok(input) })
            .unwrap();

        let payload = json!({ "message": "hello" });
        let output = registry
            .invoke("echo", &ctx(), payload.clone(), None)
            .await
            .unwrap();
        assert_eq!(output, ToolOutput::Json(payload));
    }

    #[tokio::test]
    async fn register_binding_invokes_executor() {
        let mut registry = ToolRegistry::new();
        let binding = ToolBinding::new(echo_metadata(), |input: Value| async move {
            Ok(format!("said {}", input["message"]))
        });

        registry.register_binding(binding).unwrap();

        let output = registry
            .invoke("echo", &ctx(), json!({ "message": "binding" }), None)
            .await
            .unwrap();
        assert_eq!(output.render(), "said \"binding\"");
    }

    #[tokio::test]
    async fn duplicate_registration_errors() {
        let mut registry = ToolRegistry::new();

        registry
            .register_tool(echo_metadata(), |input: Value| async move { Ok(input) })
            .unwrap();

        let err = registry
            .register_tool(
                ToolMetadata::new("echo").unwrap(),
                |v: Value| async move { Ok(v) },
            )
            .expect_err("duplicate registration should fail");

        assert!(matches!(err, ToolError::DuplicateTool { name } if name == "echo"));
    }

    #[tokio::test]
    async fn unknown_tool_errors() {
        let registry = ToolRegistry::new();
        let err = registry
            .invoke("missing", &ctx(), Value::Null, None)
            .await
            .expect_err("unknown tool should error");

        assert!(matches!(err, ToolError::UnknownTool { ref name } if name == "missing"));
        assert_eq!(err.kind(), ToolErrorKind::UnknownTool);
    }

    #[tokio::test]
    async fn invalid_arguments_skip_the_handler() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let mut registry = ToolRegistry::new();
        registry
            .register_tool(echo_metadata(), move |input: Value| {
                let flag = Arc::clone(&flag);
                async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(input)
                }
            })
            .unwrap();

        let err = registry
            .invoke("echo", &ctx(), json!({ "message": 42 }), None)
            .await
            .expect_err("schema mismatch");

        assert_eq!(err.kind(), ToolErrorKind::InvalidArguments);
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn handler_failures_are_classified() {
        let mut registry = ToolRegistry::new();
        registry
            .register_tool(ToolMetadata::new("broken").unwrap(), |_: Value| async move {
                Err::<Value, _>(ToolError::execution("disk full"))
            })
            .unwrap();

        let err = registry
            .invoke("broken", &ctx(), json!({}), None)
            .await
            .expect_err("handler fails");
        assert_eq!(err.kind(), ToolErrorKind::HandlerFailure);
        assert!(err.to_string().contains("disk full"));
    }

    #[tokio::test]
    async fn panics_are_captured() {
        let mut registry = ToolRegistry::new();
        registry
            .register_tool(ToolMetadata::new("explode").unwrap(), |_: Value| async move {
                if true {
                    panic!("boom");
                }
                Ok(Value::Null)
            })
            .unwrap();

        let err = registry
            .invoke("explode", &ctx(), json!({}), None)
            .await
            .expect_err("panic captured");
        assert!(matches!(err, ToolError::Panicked { ref reason, .. } if reason == "boom"));
        assert_eq!(err.kind(), ToolErrorKind::HandlerFailure);
    }

    #[tokio::test]
    async fn timeouts_are_handler_failures() {
        let mut registry = ToolRegistry::new();
        registry
            .register_tool(ToolMetadata::new("slow").unwrap(), |_: Value| async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok("late")
            })
            .unwrap();

        let err = registry
            .invoke("slow", &ctx(), json!({}), Some(Duration::from_millis(10)))
            .await
            .expect_err("timeout");
        assert!(matches!(err, ToolError::TimedOut { .. }));
        assert_eq!(err.kind(), ToolErrorKind::HandlerFailure);
    }

    #[tokio::test]
    async fn cancellation_stops_the_handler() {
        let mut registry = ToolRegistry::new();
        registry
            .register_tool(ToolMetadata::new("slow").unwrap(), |_: Value| async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok("late")
            })
            .unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let err = registry
            .invoke(
                "slow",
                &ctx().with_cancellation(token),
                json!({}),
                None,
            )
            .await
            .expect_err("cancelled");
        assert!(matches!(err, ToolError::Cancelled { .. }));
    }

    #[test]
    fn invalid_metadata_errors() {
        let err = ToolMetadata::new("").expect_err("empty name should error");
        assert!(matches!(err, ToolError::InvalidMetadata { .. }));

        let mut registry = ToolRegistry::new();
        let err = registry
            .register_tool(
                ToolMetadata::new("bad_schema")
                    .unwrap()
                    .with_parameters(json!({"type": 3})),
                |v: Value| async move { Ok(v) },
            )
            .expect_err("schema should not compile");
        assert_eq!(err.kind(), ToolErrorKind::Registration);
    }

    #[test]
    fn list_preserves_registration_order() {
        let mut registry = ToolRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry
                .register_tool(ToolMetadata::new(name).unwrap(), |v: Value| async move { Ok(v) })
                .unwrap();
        }
        let names: Vec<_> = registry
            .list()
            .iter()
            .map(|meta| meta.name().as_str().to_owned())
            .collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
        assert_eq!(registry.len(), 3);
    }
}
