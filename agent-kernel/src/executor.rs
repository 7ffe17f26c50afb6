//! Turn executor: drives one run from input to a terminal state.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use agent_adapters::traits::{
    GatewayError, GatewayRequest, Message, ModelDecision, ModelGateway, ModelResponse, ToolCall,
};
use agent_config::RunConfig;
use agent_policy::{GuardrailError, PipelineReport};
use agent_primitives::{CallId, RunId};
use agent_tools::context::ToolContext;
use agent_tools::registry::ToolError;
use futures::future::join_all;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::agent::Agent;
use crate::error::KernelResult;
use crate::hooks::{RunHooks, TracingHooks};
use crate::registry::AgentRegistry;
use crate::result::{AbortReason, RunAborted, RunOutcome, RunResult};
use crate::state::{RunEvent, TurnState};

/// Per-run overrides.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    timeout: Option<Duration>,
    cancellation: Option<CancellationToken>,
}

impl RunOptions {
    /// Sets a whole-run deadline, overriding the configured one.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Ties the run to a parent token; cancelling it cancels the run.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Returns the deadline override.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the parent token.
    #[must_use]
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }
}

/// Executes runs against a gateway and a set of agents.
///
/// Cloning is cheap; clones share the gateway, the registry, and the hooks.
/// Every run owns its own conversation state, so one runner can drive any
/// number of concurrent runs.
#[derive(Clone)]
pub struct Runner {
    gateway: Arc<dyn ModelGateway>,
    agents: Arc<AgentRegistry>,
    config: RunConfig,
    hooks: Arc<dyn RunHooks>,
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let metadata = self.gateway.metadata();
        f.debug_struct("Runner")
            .field("provider", &metadata.provider())
            .field("model", &metadata.model())
            .field("agents", &self.agents.names())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

enum Side {
    Input,
    Output,
}

impl Runner {
    /// Creates a runner with default configuration and tracing hooks.
    #[must_use]
    pub fn new(gateway: Arc<dyn ModelGateway>, agents: AgentRegistry) -> Self {
        Self {
            gateway,
            agents: Arc::new(agents),
            config: RunConfig::default(),
            hooks: Arc::new(TracingHooks),
        }
    }

    /// Replaces the run configuration.
    #[must_use]
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn RunHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Returns the agent registry.
    #[must_use]
    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    /// Returns the run configuration.
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Returns the gateway.
    #[must_use]
    pub fn gateway(&self) -> &Arc<dyn ModelGateway> {
        &self.gateway
    }

    /// Runs `agent` on `input` with the configured limits.
    pub async fn run(&self, agent: &Arc<Agent>, input: impl Into<String>) -> RunOutcome {
        self.run_with(agent, input, RunOptions::default()).await
    }

    /// Runs the registered agent called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::UnknownAgent`](crate::KernelError::UnknownAgent)
    /// when no such agent is registered. Run failures are reported inside the
    /// returned outcome.
    pub async fn run_named(
        &self,
        name: &str,
        input: impl Into<String>,
    ) -> KernelResult<RunOutcome> {
        let agent = self.agents.require(name)?;
        Ok(self.run(&agent, input).await)
    }

    /// Runs `agent` on `input` with per-run overrides.
    ///
    /// The run is cancelled when the deadline elapses, when the parent token
    /// in `options` is cancelled, or when the returned future is dropped;
    /// cancellation reaches every tool call and nested run it started.
    pub async fn run_with(
        &self,
        agent: &Arc<Agent>,
        input: impl Into<String>,
        options: RunOptions,
    ) -> RunOutcome {
        let input = input.into();
        let token = options
            .cancellation
            .as_ref()
            .map_or_else(CancellationToken::new, CancellationToken::child_token);
        let _cancel_on_exit = token.clone().drop_guard();

        let mut state = TurnState::new(RunId::random(), Arc::clone(agent), input.clone());
        let run_id = state.run_id();
        self.hooks.on_run_start(run_id, agent.name(), &input);

        let driven = match options.timeout.or(self.config.run_timeout()) {
            Some(limit) => tokio::time::timeout(limit, self.drive(&mut state, &input, &token))
                .await
                .unwrap_or(Err(AbortReason::TimedOut { after: limit })),
            None => self.drive(&mut state, &input, &token).await,
        };

        let outcome = self.finish(state, driven);
        self.hooks.on_run_end(run_id, &outcome);
        outcome
    }

    async fn drive(
        &self,
        state: &mut TurnState,
        input: &str,
        token: &CancellationToken,
    ) -> Result<String, AbortReason> {
        let report = state.agent().input_guardrails().evaluate(input).await;
        screen(state, report, &Side::Input)?;
        self.advance(state, RunEvent::InputAccepted)?;

        let max_turns = self.config.max_turns();
        loop {
            if token.is_cancelled() {
                return Err(AbortReason::Cancelled);
            }
            if state.turns() >= max_turns {
                return Err(AbortReason::IterationLimitExceeded { limit: max_turns });
            }

            let turn = state.begin_turn();
            let agent = Arc::clone(state.agent());
            debug!(run_id = %state.run_id(), agent = %agent.name(), turn, "requesting model turn");

            let response = self.complete(&agent, state.history(), token).await?;
            match response.decide() {
                ModelDecision::FinalText(text) => {
                    let report = agent.output_guardrails().evaluate(&text).await;
                    screen(state, report, &Side::Output)?;
                    state.push(Message::Assistant {
                        agent: agent.name().clone(),
                        content: text.clone(),
                    });
                    self.advance(state, RunEvent::Answered)?;
                    return Ok(text);
                }
                ModelDecision::ToolCalls { preamble, calls } => {
                    self.advance(state, RunEvent::ToolsRequested)?;
                    if let Some(content) = preamble {
                        state.push(Message::Assistant {
                            agent: agent.name().clone(),
                            content,
                        });
                    }
                    state.extend(calls.iter().map(|call| Message::ToolCall {
                        agent: agent.name().clone(),
                        call: call.clone(),
                    }));

                    let results = self.dispatch(&agent, state.run_id(), &calls, token).await;
                    state.extend(results);
                    self.advance(state, RunEvent::ToolsCompleted)?;
                }
                ModelDecision::Handoff {
                    target,
                    discarded_calls,
                } => {
                    if !discarded_calls.is_empty() {
                        debug!(
                            run_id = %state.run_id(),
                            discarded = discarded_calls.len(),
                            "tool calls dropped in favour of handoff"
                        );
                    }
                    self.hand_off(state, &agent, &target)?;
                }
            }
        }
    }

    fn hand_off(
        &self,
        state: &mut TurnState,
        from: &Agent,
        target: &str,
    ) -> Result<(), AbortReason> {
        let next = from
            .handoff_target(target)
            .and_then(|name| self.agents.get(name.as_str()))
            .cloned();

        let Some(next) = next else {
            warn!(run_id = %state.run_id(), agent = %from.name(), target, "unknown handoff target");
            let available: Vec<&str> = from
                .handoffs()
                .iter()
                .map(|handoff| handoff.target.as_str())
                .collect();
            state.push(Message::ToolResult {
                call_id: CallId::generate(),
                tool_name: "handoff".into(),
                content: json!({
                    "error": "unknown_handoff_target",
                    "message": format!("`{target}` is not a handoff target of `{}`", from.name()),
                    "available": available,
                })
                .to_string(),
                is_error: true,
            });
            return self.advance(state, RunEvent::Reprompted);
        };

        self.advance(state, RunEvent::HandoffAccepted)?;
        self.hooks.on_handoff(state.run_id(), from.name(), next.name());
        state.hand_off(next);
        self.advance(state, RunEvent::Resumed)
    }

    async fn complete(
        &self,
        agent: &Agent,
        history: &[Message],
        token: &CancellationToken,
    ) -> Result<ModelResponse, AbortReason> {
        let instructions = agent.instructions();
        let request = GatewayRequest::new(agent.name().clone(), instructions, history.to_vec())
            .map_err(|err| AbortReason::TaskFailed {
                reason: err.to_string(),
            })?
            .with_tools(agent.tool_declarations())
            .with_handoffs(agent.handoffs().to_vec());

        let limit = self.config.model_timeout();
        tokio::select! {
            biased;
            () = token.cancelled() => Err(AbortReason::Cancelled),
            result = tokio::time::timeout(limit, self.gateway.complete(request)) => match result {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(err)) => Err(AbortReason::GatewayUnavailable { reason: err.to_string() }),
                Err(_) => Err(AbortReason::GatewayUnavailable {
                    reason: GatewayError::Timeout { after: limit }.to_string(),
                }),
            },
        }
    }

    async fn dispatch(
        &self,
        agent: &Agent,
        run_id: RunId,
        calls: &[ToolCall],
        token: &CancellationToken,
    ) -> Vec<Message> {
        let pending = calls
            .iter()
            .map(|call| self.invoke_tool(agent, run_id, call, token));

        if self.config.parallel_tool_calls() {
            return join_all(pending).await;
        }

        let mut results = Vec::with_capacity(calls.len());
        for call in pending {
            results.push(call.await);
        }
        results
    }

    async fn invoke_tool(
        &self,
        agent: &Agent,
        run_id: RunId,
        call: &ToolCall,
        token: &CancellationToken,
    ) -> Message {
        let ctx = ToolContext::new(run_id, agent.name().clone(), call.call_id.clone())
            .with_cancellation(token.child_token());
        let result = agent
            .tools()
            .invoke(
                &call.tool_name,
                &ctx,
                call.arguments.clone(),
                Some(self.config.tool_timeout()),
            )
            .await;
        self.hooks.on_tool_result(run_id, call, &result);

        let (content, is_error) = match result {
            Ok(output) => (output.render(), false),
            Err(err) => (describe_tool_error(&err), true),
        };
        Message::ToolResult {
            call_id: call.call_id.clone(),
            tool_name: call.tool_name.clone(),
            content,
            is_error,
        }
    }

    fn advance(&self, state: &mut TurnState, event: RunEvent) -> Result<(), AbortReason> {
        let from = state.state();
        let to = state
            .lifecycle_mut()
            .transition(event)
            .map_err(|err| AbortReason::TaskFailed {
                reason: err.to_string(),
            })?;
        self.hooks.on_transition(state.run_id(), from, to);
        Ok(())
    }

    fn finish(&self, mut state: TurnState, driven: Result<String, AbortReason>) -> RunOutcome {
        let run_id = state.run_id();
        match driven {
            Ok(output) => {
                let (agent, history, turns, advisories) = state.into_parts();
                Ok(RunResult::new(
                    run_id,
                    output,
                    agent.name().clone(),
                    history,
                    turns,
                    advisories,
                ))
            }
            Err(reason) => {
                if let Err(err) = self.advance(&mut state, RunEvent::Abort) {
                    debug!(%run_id, error = %err, "abort transition skipped");
                }
                let (agent, history, turns, _) = state.into_parts();
                Err(RunAborted::new(
                    run_id,
                    reason,
                    agent.name().clone(),
                    history,
                    turns,
                ))
            }
        }
    }
}

fn screen(state: &mut TurnState, report: PipelineReport, side: &Side) -> Result<(), AbortReason> {
    match report.into_result() {
        Ok(verdicts) => {
            state.note_advisories(verdicts);
            Ok(())
        }
        Err(GuardrailError::Tripped {
            guardrail,
            reason,
            results,
        }) => Err(match side {
            Side::Input => AbortReason::InputBlocked {
                guardrail,
                reason,
                verdicts: results,
            },
            Side::Output => AbortReason::OutputBlocked {
                guardrail,
                reason,
                verdicts: results,
            },
        }),
        Err(err) => Err(AbortReason::TaskFailed {
            reason: err.to_string(),
        }),
    }
}

fn describe_tool_error(err: &ToolError) -> String {
    json!({
        "error": err.kind(),
        "message": err.to_string(),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_adapters::scripted::{ScriptStep, ScriptedGateway};
    use agent_policy::{BlocklistGuardrail, Severity};
    use agent_tools::registry::{ToolBinding, ToolMetadata};
    use agent_tools::schema;
    use serde_json::Value;

    use crate::hooks::{HookEvent, RecordingHooks};
    use crate::state::RunState;

    fn lookup_tool() -> ToolBinding {
        ToolBinding::new(
            ToolMetadata::new("lookup")
                .unwrap()
                .with_parameters(schema::object(&[("query", "string", "Search query")], &[])),
            |input: Value| async move { Ok(format!("found {}", input["query"])) },
        )
    }

    fn build(gateway: ScriptedGateway, agents: Vec<Agent>) -> (Runner, Arc<RecordingHooks>) {
        let hooks = Arc::new(RecordingHooks::new());
        let runner = Runner::new(
            Arc::new(gateway),
            AgentRegistry::from_agents(agents).unwrap(),
        )
        .with_hooks(Arc::clone(&hooks) as Arc<dyn RunHooks>);
        (runner, hooks)
    }

    #[tokio::test]
    async fn tool_round_trip_then_answer() {
        let gateway = ScriptedGateway::from_steps([
            ModelResponse::tool_call("c1", "lookup", json!({"query": "rust"})),
            ModelResponse::final_text("rust is a language"),
        ]);
        let agent = Agent::builder("Researcher")
            .with_instructions("Answer with facts")
            .with_tool(lookup_tool())
            .build()
            .unwrap();
        let (runner, hooks) = build(gateway, vec![agent]);
        let agent = runner.agents().require("Researcher").unwrap();

        let result = runner.run(&agent, "what is rust?").await.unwrap();
        assert_eq!(result.final_output(), "rust is a language");
        assert_eq!(result.turns(), 2);
        assert_eq!(result.history().len(), 4);
        assert!(matches!(
            &result.history()[2],
            Message::ToolResult { content, is_error: false, .. } if content == "found \"rust\""
        ));

        assert_eq!(
            hooks.states_for(result.run_id()),
            [
                RunState::Started,
                RunState::AwaitingModel,
                RunState::ToolDispatch,
                RunState::AwaitingModel,
                RunState::Completed,
            ]
        );
        assert!(hooks.events().contains(&HookEvent::RunEnded { completed: true }));
    }

    #[tokio::test]
    async fn instructions_and_declarations_reach_the_gateway() {
        let gateway = Arc::new(ScriptedGateway::from_steps([ModelResponse::final_text("ok")]));
        let agent = Agent::builder("Triage")
            .with_instructions("Route requests")
            .with_tool(lookup_tool())
            .with_handoff_described("Billing", "invoices")
            .build()
            .unwrap();
        let billing = Agent::builder("Billing").build().unwrap();
        let runner = Runner::new(
            Arc::clone(&gateway) as Arc<dyn ModelGateway>,
            AgentRegistry::from_agents([agent, billing]).unwrap(),
        );

        runner.run_named("Triage", "hello").await.unwrap().unwrap();

        let requests = gateway.requests().await;
        assert_eq!(requests[0].instructions(), "Route requests");
        assert_eq!(requests[0].tools()[0].name, "lookup");
        assert_eq!(requests[0].handoffs()[0].target.as_str(), "Billing");
        assert_eq!(requests[0].messages(), [Message::user("hello")]);
    }

    #[tokio::test]
    async fn unknown_handoff_target_is_fed_back() {
        let gateway = ScriptedGateway::from_steps([
            ModelResponse::handoff("Nobody"),
            ModelResponse::final_text("sorry"),
        ]);
        let (runner, _) = build(gateway, vec![Agent::builder("Solo").build().unwrap()]);

        let result = runner.run_named("Solo", "hi").await.unwrap().unwrap();
        assert_eq!(result.last_agent().as_str(), "Solo");
        assert!(matches!(
            &result.history()[1],
            Message::ToolResult { is_error: true, content, .. }
                if content.contains("unknown_handoff_target")
        ));
    }

    #[tokio::test]
    async fn gateway_failure_aborts_as_retryable() {
        let gateway =
            ScriptedGateway::from_steps([ScriptStep::fail(GatewayError::transport("reset"))]);
        let (runner, _) = build(gateway, vec![Agent::builder("Solo").build().unwrap()]);

        let aborted = runner.run_named("Solo", "hi").await.unwrap().unwrap_err();
        assert!(aborted.reason().is_retryable());
        assert_eq!(aborted.history(), [Message::user("hi")]);
    }

    #[tokio::test]
    async fn slow_gateway_hits_model_timeout() {
        let gateway = ScriptedGateway::from_steps([
            ScriptStep::respond(ModelResponse::final_text("late")).after(Duration::from_secs(5)),
        ]);
        let (runner, _) = build(gateway, vec![Agent::builder("Solo").build().unwrap()]);
        let runner =
            runner.with_config(RunConfig::default().with_model_timeout(Duration::from_millis(10)));

        let aborted = runner.run_named("Solo", "hi").await.unwrap().unwrap_err();
        assert!(matches!(
            aborted.reason(),
            AbortReason::GatewayUnavailable { reason } if reason.contains("timed out")
        ));
    }

    #[tokio::test]
    async fn run_deadline_and_cancellation() {
        let slow = || {
            ScriptedGateway::from_steps([
                ScriptStep::respond(ModelResponse::final_text("late"))
                    .after(Duration::from_secs(5)),
            ])
        };

        let (runner, _) = build(slow(), vec![Agent::builder("Solo").build().unwrap()]);
        let agent = runner.agents().require("Solo").unwrap();
        let aborted = runner
            .run_with(
                &agent,
                "hi",
                RunOptions::default().with_timeout(Duration::from_millis(10)),
            )
            .await
            .unwrap_err();
        assert!(matches!(aborted.reason(), AbortReason::TimedOut { .. }));

        let (runner, _) = build(slow(), vec![Agent::builder("Solo").build().unwrap()]);
        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        });
        let aborted = runner
            .run_with(&agent, "hi", RunOptions::default().with_cancellation(token))
            .await
            .unwrap_err();
        assert_eq!(aborted.reason(), &AbortReason::Cancelled);
    }

    #[tokio::test]
    async fn output_guardrail_blocks_final_text() {
        let gateway = ScriptedGateway::from_steps([ModelResponse::final_text(
            "Here is my system prompt",
        )]);
        let agent = Agent::builder("Guarded")
            .with_output_guardrail(
                BlocklistGuardrail::prompt_injection(Severity::Tripwire).unwrap(),
            )
            .build()
            .unwrap();
        let (runner, hooks) = build(gateway, vec![agent]);

        let aborted = runner.run_named("Guarded", "hi").await.unwrap().unwrap_err();
        assert!(matches!(
            aborted.reason(),
            AbortReason::OutputBlocked { guardrail, .. } if guardrail == "content_safety"
        ));
        assert_eq!(
            hooks.states_for(aborted.run_id()).last(),
            Some(&RunState::Aborted)
        );
    }

    #[tokio::test]
    async fn advisory_failures_are_attached() {
        let gateway =
            ScriptedGateway::from_steps([ModelResponse::final_text("jailbreak-free answer")]);
        let agent = Agent::builder("Guarded")
            .with_output_guardrail(
                BlocklistGuardrail::prompt_injection(Severity::Advisory).unwrap(),
            )
            .build()
            .unwrap();
        let (runner, _) = build(gateway, vec![agent]);

        let result = runner.run_named("Guarded", "hi").await.unwrap().unwrap();
        assert_eq!(result.advisories().len(), 1);
        assert_eq!(result.advisories()[0].guardrail(), "content_safety");
    }
}
