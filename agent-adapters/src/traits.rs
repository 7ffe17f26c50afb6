//! Shared gateway traits and transcript data structures.

use std::fmt;
use std::time::Duration;

use agent_primitives::{AgentName, CallId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result alias used by model gateways.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Error type shared by gateway implementations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Gateway is misconfigured or missing credentials.
    #[error("gateway not configured: {reason}")]
    Configuration {
        /// Additional context for the failure.
        reason: String,
    },

    /// The supplied request was invalid for the target model.
    #[error("invalid gateway request: {reason}")]
    InvalidRequest {
        /// Reason describing why the request could not be processed.
        reason: String,
    },

    /// Transport-level failures (network, protocol, etc.).
    #[error("gateway transport error: {reason}")]
    Transport {
        /// Additional context about the error.
        reason: String,
    },

    /// The provider rejected the request due to rate limiting.
    #[error("gateway rate limited (retry after {retry_after:?})")]
    RateLimited {
        /// Suggested delay before retrying.
        retry_after: Option<Duration>,
    },

    /// The provider did not answer within the allotted time.
    #[error("gateway call timed out after {after:?}")]
    Timeout {
        /// Deadline that elapsed.
        after: Duration,
    },

    /// The provider returned a malformed response.
    #[error("gateway response error: {reason}")]
    Response {
        /// Additional context about the response failure.
        reason: String,
    },
}

impl GatewayError {
    /// Convenience constructor for invalid requests.
    #[must_use]
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for configuration issues.
    #[must_use]
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for transport failures.
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for malformed responses.
    #[must_use]
    pub fn response(reason: impl Into<String>) -> Self {
        Self::Response {
            reason: reason.into(),
        }
    }

    /// Returns `true` when repeating the same request may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::RateLimited { .. } | Self::Timeout { .. }
        )
    }
}

/// Minimal metadata describing a gateway instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayMetadata {
    provider: &'static str,
    model: String,
}

impl GatewayMetadata {
    /// Creates metadata for the supplied provider and model identifier.
    #[must_use]
    pub fn new(provider: &'static str, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Returns the provider identifier (e.g., "scripted").
    #[must_use]
    pub const fn provider(&self) -> &'static str {
        self.provider
    }

    /// Returns the configured model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Roles a transcript entry is presented under.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Runtime-authored markers such as handoff transitions.
    System,
    /// User-authored content.
    User,
    /// Assistant (model) output, including tool-call requests.
    Assistant,
    /// Tool results fed back to the model.
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        })
    }
}

/// Tool invocation requested by the model.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ToolCall {
    /// Identifier echoed back on the matching tool result.
    pub call_id: CallId,
    /// Name of the requested tool.
    pub tool_name: String,
    /// Raw, not yet validated arguments.
    pub arguments: Value,
}

impl ToolCall {
    /// Creates a tool call.
    #[must_use]
    pub fn new(call_id: impl Into<CallId>, tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// Single entry of a run transcript.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    /// Input supplied by the caller.
    User {
        /// Message text.
        content: String,
    },
    /// Text produced by the model on behalf of an agent.
    Assistant {
        /// Agent that was active when the text was produced.
        agent: AgentName,
        /// Message text.
        content: String,
    },
    /// Tool invocation requested by the model.
    ToolCall {
        /// Agent that was active when the call was requested.
        agent: AgentName,
        /// The requested call.
        call: ToolCall,
    },
    /// Result (or error) of a tool invocation.
    ToolResult {
        /// Identifier of the call this result answers.
        call_id: CallId,
        /// Tool that produced the result.
        tool_name: String,
        /// Rendered output or error description.
        content: String,
        /// Whether the content describes a failure.
        is_error: bool,
    },
    /// Marker recording a transfer of control between agents.
    Handoff {
        /// Agent that gave up control.
        from: AgentName,
        /// Agent that received control.
        to: AgentName,
    },
}

impl Message {
    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Returns the role this entry is presented under.
    #[must_use]
    pub const fn role(&self) -> Role {
        match self {
            Self::User { .. } => Role::User,
            Self::Assistant { .. } | Self::ToolCall { .. } => Role::Assistant,
            Self::ToolResult { .. } => Role::Tool,
            Self::Handoff { .. } => Role::System,
        }
    }

    /// Renders the textual content of the entry.
    #[must_use]
    pub fn content(&self) -> String {
        match self {
            Self::User { content } | Self::Assistant { content, .. } => content.clone(),
            Self::ToolCall { call, .. } => format!("{}({})", call.tool_name, call.arguments),
            Self::ToolResult { content, .. } => content.clone(),
            Self::Handoff { from, to } => format!("control transferred from {from} to {to}"),
        }
    }

    /// Returns the call identifier for tool calls and tool results.
    #[must_use]
    pub fn call_id(&self) -> Option<&CallId> {
        match self {
            Self::ToolCall { call, .. } => Some(&call.call_id),
            Self::ToolResult { call_id, .. } => Some(call_id),
            _ => None,
        }
    }
}

/// Callable tool advertised to the model.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ToolDeclaration {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema of the tool arguments.
    pub parameters: Value,
}

/// Peer agent the model may transfer control to.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct HandoffDeclaration {
    /// Name of the target agent.
    pub target: AgentName,
    /// When the model should pick this target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Request submitted to a model gateway.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct GatewayRequest {
    agent: AgentName,
    instructions: String,
    messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDeclaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    handoffs: Vec<HandoffDeclaration>,
}

impl GatewayRequest {
    /// Creates a request for the active agent.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the transcript is empty.
    pub fn new(
        agent: AgentName,
        instructions: impl Into<String>,
        messages: Vec<Message>,
    ) -> GatewayResult<Self> {
        if messages.is_empty() {
            return Err(GatewayError::invalid_request(
                "gateway request requires at least one message",
            ));
        }

        Ok(Self {
            agent,
            instructions: instructions.into(),
            messages,
            tools: Vec::new(),
            handoffs: Vec::new(),
        })
    }

    /// Declares the tools the model may call.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDeclaration>) -> Self {
        self.tools = tools;
        self
    }

    /// Declares the agents the model may hand off to.
    #[must_use]
    pub fn with_handoffs(mut self, handoffs: Vec<HandoffDeclaration>) -> Self {
        self.handoffs = handoffs;
        self
    }

    /// Returns the active agent name.
    #[must_use]
    pub fn agent(&self) -> &AgentName {
        &self.agent
    }

    /// Returns the active agent's instructions (system context).
    #[must_use]
    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Returns the transcript.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the declared tools.
    #[must_use]
    pub fn tools(&self) -> &[ToolDeclaration] {
        &self.tools
    }

    /// Returns the declared handoff targets.
    #[must_use]
    pub fn handoffs(&self) -> &[HandoffDeclaration] {
        &self.handoffs
    }

    /// Returns the most recent user message, if any.
    #[must_use]
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages.iter().rev().find_map(|message| match message {
            Message::User { content } => Some(content.as_str()),
            _ => None,
        })
    }
}

/// Raw completion returned by a gateway.
///
/// Backends may populate several fields at once; [`ModelResponse::decide`]
/// resolves the completion into exactly one [`ModelDecision`].
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ModelResponse {
    /// Final or commentary text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Requested tool calls, in model order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Requested handoff target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff: Option<String>,
}

impl ModelResponse {
    /// Response carrying a final answer.
    #[must_use]
    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Response requesting tool calls.
    #[must_use]
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::default()
        }
    }

    /// Response requesting a single tool call.
    #[must_use]
    pub fn tool_call(call_id: &str, tool_name: &str, arguments: Value) -> Self {
        Self::tool_calls(vec![ToolCall::new(call_id, tool_name, arguments)])
    }

    /// Response selecting a handoff target.
    #[must_use]
    pub fn handoff(target: impl Into<String>) -> Self {
        Self {
            handoff: Some(target.into()),
            ..Self::default()
        }
    }

    /// Adds tool calls to the response.
    #[must_use]
    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = calls;
        self
    }

    /// Adds text to the response.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Resolves the completion into a single decision.
    ///
    /// A handoff wins over tool calls issued in the same response, and tool
    /// calls win over text. A response with nothing in it is an empty final
    /// answer.
    #[must_use]
    pub fn decide(self) -> ModelDecision {
        if let Some(target) = self.handoff {
            return ModelDecision::Handoff {
                target,
                discarded_calls: self.tool_calls,
            };
        }

        if !self.tool_calls.is_empty() {
            return ModelDecision::ToolCalls {
                preamble: self.text.filter(|text| !text.trim().is_empty()),
                calls: self.tool_calls,
            };
        }

        ModelDecision::FinalText(self.text.unwrap_or_default())
    }
}

/// Single decision taken by the model for one turn.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelDecision {
    /// The model answered; the run may complete.
    FinalText(String),
    /// The model wants tools executed before continuing.
    ToolCalls {
        /// Commentary emitted alongside the calls.
        preamble: Option<String>,
        /// Calls in the order the model requested them.
        calls: Vec<ToolCall>,
    },
    /// The model transfers control to a peer agent.
    Handoff {
        /// Requested target name, not yet resolved.
        target: String,
        /// Tool calls dropped because the handoff took precedence.
        discarded_calls: Vec<ToolCall>,
    },
}

/// Trait implemented by all model gateways.
///
/// Implementations must be safe to call concurrently and idempotent-safe to
/// retry; the runtime itself never retries a failed call.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Returns basic metadata describing the gateway instance.
    fn metadata(&self) -> &GatewayMetadata;

    /// Produces the model's decision for the supplied transcript.
    async fn complete(&self, request: GatewayRequest) -> GatewayResult<ModelResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn agent() -> AgentName {
        AgentName::new("Triage Agent").unwrap()
    }

    #[test]
    fn validates_request_messages() {
        let err = GatewayRequest::new(agent(), "route", Vec::new()).expect_err("messages required");
        assert!(matches!(err, GatewayError::InvalidRequest { .. }));
    }

    #[test]
    fn builds_request() {
        let request = GatewayRequest::new(agent(), "route", vec![Message::user("ping")])
            .unwrap()
            .with_tools(vec![ToolDeclaration {
                name: "echo".into(),
                description: None,
                parameters: json!({"type": "object"}),
            }])
            .with_handoffs(vec![HandoffDeclaration {
                target: AgentName::new("Sales Agent").unwrap(),
                description: Some("pricing".into()),
            }]);

        assert_eq!(request.messages().len(), 1);
        assert_eq!(request.tools()[0].name, "echo");
        assert_eq!(request.handoffs()[0].target.as_str(), "Sales Agent");
        assert_eq!(request.last_user_message(), Some("ping"));
    }

    #[test]
    fn handoff_takes_precedence_over_tool_calls() {
        let response = ModelResponse::handoff("Sales Agent")
            .with_tool_calls(vec![ToolCall::new("c1", "lookup", json!({}))]);

        match response.decide() {
            ModelDecision::Handoff {
                target,
                discarded_calls,
            } => {
                assert_eq!(target, "Sales Agent");
                assert_eq!(discarded_calls.len(), 1);
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn tool_calls_take_precedence_over_text() {
        let response = ModelResponse::tool_call("c1", "lookup", json!({})).with_text("checking");
        assert!(matches!(
            response.decide(),
            ModelDecision::ToolCalls { preamble: Some(ref p), ref calls }
                if p == "checking" && calls.len() == 1
        ));
    }

    #[test]
    fn empty_response_is_empty_final_text() {
        assert_eq!(
            ModelResponse::default().decide(),
            ModelDecision::FinalText(String::new())
        );
    }

    #[test]
    fn message_roles_and_content() {
        let call = ToolCall::new("c1", "lookup", json!({"q": 1}));
        let message = Message::ToolCall {
            agent: agent(),
            call,
        };
        assert_eq!(message.role(), Role::Assistant);
        assert_eq!(message.content(), "lookup({\"q\":1})");
        assert_eq!(message.call_id().map(CallId::as_str), Some("c1"));

        let marker = Message::Handoff {
            from: agent(),
            to: AgentName::new("Sales Agent").unwrap(),
        };
        assert_eq!(marker.role(), Role::System);
        assert!(marker.content().contains("Sales Agent"));
    }

    #[test]
    fn transient_errors() {
        assert!(GatewayError::transport("reset").is_transient());
        assert!(
            GatewayError::Timeout {
                after: Duration::from_secs(1)
            }
            .is_transient()
        );
        assert!(!GatewayError::configuration("no key").is_transient());
    }
}
