//! Deterministic gateway that replays pre-recorded decisions.
//!
//! Used by tests and offline demos. Steps can be scripted for a specific agent
//! or for whichever agent asks next; agent-specific scripts are consulted
//! first.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::traits::{
    GatewayError, GatewayMetadata, GatewayRequest, GatewayResult, ModelGateway, ModelResponse,
};

/// One scripted gateway reply.
#[derive(Debug)]
pub struct ScriptStep {
    delay: Option<Duration>,
    result: GatewayResult<ModelResponse>,
}

impl ScriptStep {
    /// Step answering with the supplied response.
    #[must_use]
    pub fn respond(response: ModelResponse) -> Self {
        Self {
            delay: None,
            result: Ok(response),
        }
    }

    /// Step failing with the supplied error.
    #[must_use]
    pub fn fail(error: GatewayError) -> Self {
        Self {
            delay: None,
            result: Err(error),
        }
    }

    /// Delays the reply, simulating backend latency.
    #[must_use]
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl From<ModelResponse> for ScriptStep {
    fn from(value: ModelResponse) -> Self {
        Self::respond(value)
    }
}

#[derive(Debug, Default)]
struct Script {
    shared: VecDeque<ScriptStep>,
    per_agent: HashMap<String, VecDeque<ScriptStep>>,
    requests: Vec<GatewayRequest>,
}

/// Gateway replaying scripted steps in order.
#[derive(Debug)]
pub struct ScriptedGateway {
    metadata: GatewayMetadata,
    script: Mutex<Script>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedGateway {
    /// Creates an empty scripted gateway.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: GatewayMetadata::new("scripted", "replay"),
            script: Mutex::new(Script::default()),
        }
    }

    /// Creates a gateway answering every agent from one shared queue.
    #[must_use]
    pub fn from_steps<I, S>(steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ScriptStep>,
    {
        Self {
            metadata: GatewayMetadata::new("scripted", "replay"),
            script: Mutex::new(Script {
                shared: steps.into_iter().map(Into::into).collect(),
                ..Script::default()
            }),
        }
    }

    /// Appends a step to the shared queue.
    pub async fn push(&self, step: impl Into<ScriptStep>) {
        self.script.lock().await.shared.push_back(step.into());
    }

    /// Appends a step answered only when `agent` is active.
    pub async fn push_for(&self, agent: &str, step: impl Into<ScriptStep>) {
        self.script
            .lock()
            .await
            .per_agent
            .entry(agent.to_owned())
            .or_default()
            .push_back(step.into());
    }

    /// Returns the requests received so far, in arrival order.
    pub async fn requests(&self) -> Vec<GatewayRequest> {
        self.script.lock().await.requests.clone()
    }

    /// Returns how many requests have been received.
    pub async fn call_count(&self) -> usize {
        self.script.lock().await.requests.len()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    fn metadata(&self) -> &GatewayMetadata {
        &self.metadata
    }

    async fn complete(&self, request: GatewayRequest) -> GatewayResult<ModelResponse> {
        let step = {
            let mut script = self.script.lock().await;
            let agent = request.agent().as_str().to_owned();
            script.requests.push(request);
            let own = script
                .per_agent
                .get_mut(&agent)
                .and_then(VecDeque::pop_front);
            own.or_else(|| script.shared.pop_front()).ok_or_else(|| {
                GatewayError::response(format!("script exhausted for agent `{agent}`"))
            })?
        };

        if let Some(delay) = step.delay {
            tokio::time::sleep(delay).await;
        }

        debug!(ok = step.result.is_ok(), "scripted gateway replied");
        step.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Message;
    use agent_primitives::AgentName;

    fn request(agent: &str) -> GatewayRequest {
        GatewayRequest::new(AgentName::new(agent).unwrap(), "", vec![Message::user("hi")]).unwrap()
    }

    #[tokio::test]
    async fn replays_shared_steps_in_order() {
        let gateway = ScriptedGateway::from_steps([
            ModelResponse::final_text("one"),
            ModelResponse::final_text("two"),
        ]);

        let first = gateway.complete(request("a")).await.unwrap();
        let second = gateway.complete(request("b")).await.unwrap();
        assert_eq!(first.text.as_deref(), Some("one"));
        assert_eq!(second.text.as_deref(), Some("two"));
        assert_eq!(gateway.call_count().await, 2);
    }

    #[tokio::test]
    async fn agent_scripts_take_priority() {
        let gateway = ScriptedGateway::from_steps([ModelResponse::final_text("shared")]);
        gateway
            .push_for("special", ModelResponse::final_text("mine"))
            .await;

        let special = gateway.complete(request("special")).await.unwrap();
        assert_eq!(special.text.as_deref(), Some("mine"));
        let other = gateway.complete(request("special")).await.unwrap();
        assert_eq!(other.text.as_deref(), Some("shared"));
    }

    #[tokio::test]
    async fn exhausted_script_errors() {
        let gateway = ScriptedGateway::new();
        let err = gateway.complete(request("a")).await.expect_err("empty script");
        assert!(matches!(err, GatewayError::Response { .. }));
    }

    #[tokio::test]
    async fn scripted_failures_are_returned() {
        let gateway =
            ScriptedGateway::from_steps([ScriptStep::fail(GatewayError::transport("reset"))]);
        let err = gateway.complete(request("a")).await.expect_err("scripted failure");
        assert!(err.is_transient());
    }
}
