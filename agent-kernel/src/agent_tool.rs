//! Exposes an agent as a tool another agent can call.
//!
//! The calling agent keeps control: the nested run starts with a fresh
//! transcript, only its final answer comes back as the tool result, and its
//! cancellation is tied to the calling tool invocation.

use std::sync::Arc;

use agent_tools::context::ToolContext;
use agent_tools::registry::{
    Tool, ToolBinding, ToolError, ToolKind, ToolMetadata, ToolOutput, ToolResult,
};
use agent_tools::schema;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::agent::Agent;
use crate::error::{KernelError, KernelResult};
use crate::executor::{RunOptions, Runner};

/// Tool that runs a nested agent on its `input` argument.
#[derive(Debug, Clone)]
pub struct AgentTool {
    agent: Arc<Agent>,
    runner: Runner,
    metadata: ToolMetadata,
    input_prefix: Option<String>,
}

impl AgentTool {
    /// Wraps `agent`; nested runs are driven by `runner`.
    ///
    /// The tool is named after the agent in `snake_case`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Tool`] when the derived tool name is invalid.
    pub fn new(agent: Arc<Agent>, runner: Runner) -> KernelResult<Self> {
        let name = tool_name_for(agent.name().as_str());
        let description = format!("Ask the {} agent and return its answer.", agent.name());
        let metadata = Self::metadata_for(&agent, name)?.with_description(description);
        Ok(Self {
            agent,
            runner,
            metadata,
            input_prefix: None,
        })
    }

    /// Overrides the tool name.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Tool`] when `name` is not a valid tool name.
    pub fn with_name(mut self, name: impl Into<String>) -> KernelResult<Self> {
        let mut metadata = Self::metadata_for(&self.agent, name.into())?;
        if let Some(description) = self.metadata.description() {
            metadata = metadata.with_description(description);
        }
        self.metadata = metadata;
        Ok(self)
    }

    /// Overrides the description shown to the calling model.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.metadata = self.metadata.with_description(description);
        self
    }

    /// Prepends `prefix` to the input before starting the nested run, for
    /// example `"Research this topic: "`.
    #[must_use]
    pub fn with_input_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.input_prefix = Some(prefix.into());
        self
    }

    /// Returns the tool metadata.
    #[must_use]
    pub fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    /// Returns the wrapped agent.
    #[must_use]
    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    /// Produces a binding ready for [`AgentBuilder::with_tool`](crate::AgentBuilder::with_tool).
    #[must_use]
    pub fn into_binding(self) -> ToolBinding {
        ToolBinding::new(self.metadata.clone(), self)
    }

    fn metadata_for(agent: &Agent, name: String) -> KernelResult<ToolMetadata> {
        let metadata = ToolMetadata::new(name).map_err(|source| KernelError::Tool {
            agent: agent.name().to_string(),
            source,
        })?;
        Ok(metadata
            .with_kind(ToolKind::AgentAsTool)
            .with_parameters(schema::object(
                &[("input", "string", "Request for the agent")],
                &[],
            )))
    }
}

#[async_trait]
impl Tool for AgentTool {
    async fn invoke(&self, ctx: &ToolContext, input: Value) -> ToolResult<ToolOutput> {
        let request = input
            .get("input")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let request = match &self.input_prefix {
            Some(prefix) => format!("{prefix}{request}"),
            None => request.to_owned(),
        };

        debug!(
            caller = %ctx.agent(),
            agent = %self.agent.name(),
            call_id = %ctx.call_id(),
            "starting nested run"
        );
        let options = RunOptions::default().with_cancellation(ctx.cancellation().clone());
        match self.runner.run_with(&self.agent, request, options).await {
            Ok(result) => Ok(ToolOutput::Text(result.into_output())),
            Err(aborted) => Err(ToolError::execution(format!(
                "agent `{}` aborted: {}",
                aborted.last_agent(),
                aborted.reason()
            ))),
        }
    }
}

/// Derives a tool name from an agent name: `"Research Agent"` becomes
/// `"research_agent"`.
fn tool_name_for(agent: &str) -> String {
    let mut name = String::with_capacity(agent.len());
    for ch in agent.chars() {
        if ch.is_ascii_alphanumeric() {
            name.push(ch.to_ascii_lowercase());
        } else if !name.is_empty() && !name.ends_with('_') {
            name.push('_');
        }
    }
    while name.ends_with('_') {
        name.pop();
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_adapters::scripted::ScriptedGateway;
    use agent_adapters::traits::ModelResponse;
    use agent_primitives::{AgentName, CallId, RunId};
    use agent_tools::registry::ToolErrorKind;
    use serde_json::json;

    use crate::registry::AgentRegistry;

    #[test]
    fn derives_snake_case_names() {
        assert_eq!(tool_name_for("Research Agent"), "research_agent");
        assert_eq!(tool_name_for("  Writer--v2 "), "writer_v2");
    }

    #[tokio::test]
    async fn nested_run_answer_becomes_tool_output() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway
            .push_for("Research Agent", ModelResponse::final_text("three facts"))
            .await;
        let runner = Runner::new(gateway.clone(), AgentRegistry::default());
        let research = Arc::new(Agent::builder("Research Agent").build().unwrap());

        let tool = AgentTool::new(research, runner)
            .unwrap()
            .with_input_prefix("Research this topic: ");
        assert_eq!(tool.metadata().name().as_str(), "research_agent");
        assert_eq!(tool.metadata().kind(), ToolKind::AgentAsTool);

        let ctx = ToolContext::new(
            RunId::random(),
            AgentName::new("Coordinator").unwrap(),
            CallId::new("c1"),
        );
        let output = tool.invoke(&ctx, json!({"input": "tides"})).await.unwrap();
        assert_eq!(output.render(), "three facts");

        let requests = gateway.requests().await;
        assert_eq!(
            requests[0].last_user_message(),
            Some("Research this topic: tides")
        );
    }

    #[tokio::test]
    async fn nested_abort_is_a_handler_failure() {
        let runner = Runner::new(Arc::new(ScriptedGateway::new()), AgentRegistry::default());
        let tool = AgentTool::new(Arc::new(Agent::builder("Writer").build().unwrap()), runner)
            .unwrap()
            .with_name("draft")
            .unwrap();
        assert_eq!(tool.metadata().name().as_str(), "draft");
        assert!(tool.metadata().description().is_some());

        let ctx = ToolContext::new(
            RunId::random(),
            AgentName::new("Coordinator").unwrap(),
            CallId::new("c1"),
        );
        let err = tool.invoke(&ctx, json!({"input": "x"})).await.unwrap_err();
        assert_eq!(err.kind(), ToolErrorKind::HandlerFailure);
        assert!(err.to_string().contains("Writer"));
    }
}
