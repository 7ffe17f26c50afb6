//! Parallel fan-out of independent runs and aggregation of their answers.

use std::sync::Arc;

use agent_adapters::traits::Message;
use agent_primitives::{AgentName, RunId};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::agent::Agent;
use crate::executor::{RunOptions, Runner};
use crate::result::{AbortReason, RunAborted, RunOutcome};
use crate::scheduler::{SchedulerConfig, SchedulerError, TaskScheduler};

/// Header placed before the branch sections handed to an aggregator.
pub const DEFAULT_AGGREGATION_PREAMBLE: &str =
    "Please synthesize these analysis results into a unified report:";

impl Runner {
    /// Runs every `(agent, input)` pair concurrently.
    ///
    /// Outcomes are returned in input order regardless of completion order.
    /// At most `max_parallel_runs` branches make progress at once; a failed
    /// branch never cancels its siblings.
    pub async fn run_parallel<I, S>(&self, branches: I) -> Vec<RunOutcome>
    where
        I: IntoIterator<Item = (Arc<Agent>, S)>,
        S: Into<String>,
    {
        self.run_parallel_with(branches, RunOptions::default())
            .await
    }

    /// Like [`Runner::run_parallel`], applying `options` to every branch.
    ///
    /// Cancelling the parent token in `options` cancels every branch, queued
    /// ones included. Each branch runs under its own child token, so one
    /// branch timing out leaves the others running.
    pub async fn run_parallel_with<I, S>(
        &self,
        branches: I,
        options: RunOptions,
    ) -> Vec<RunOutcome>
    where
        I: IntoIterator<Item = (Arc<Agent>, S)>,
        S: Into<String>,
    {
        let fan_out = options
            .cancellation()
            .map_or_else(CancellationToken::new, CancellationToken::child_token);
        let _cancel_on_exit = fan_out.clone().drop_guard();
        let scheduler = TaskScheduler::new(SchedulerConfig::from_limit(
            self.config().max_parallel_runs(),
        ));

        let mut pending = Vec::new();
        for (agent, input) in branches {
            let input: String = input.into();
            let mut branch_options =
                RunOptions::default().with_cancellation(fan_out.child_token());
            if let Some(timeout) = options.timeout() {
                branch_options = branch_options.with_timeout(timeout);
            }

            let runner = self.clone();
            let task_agent = Arc::clone(&agent);
            let task_input = input.clone();
            let handle = scheduler.spawn(&fan_out, async move {
                runner
                    .run_with(&task_agent, task_input, branch_options)
                    .await
            });
            pending.push((agent, input, handle));
        }
        debug!(branches = pending.len(), "fan-out started");

        join_all(pending.into_iter().map(|(agent, input, handle)| async move {
            let reason = match handle.await {
                Ok(Ok(outcome)) => return outcome,
                Ok(Err(SchedulerError::Cancelled)) => AbortReason::Cancelled,
                Err(err) => {
                    warn!(agent = %agent.name(), error = %err, "fan-out branch failed");
                    AbortReason::TaskFailed {
                        reason: err.to_string(),
                    }
                }
            };
            Err(RunAborted::new(
                RunId::random(),
                reason,
                agent.name().clone(),
                vec![Message::user(input)],
                0,
            ))
        }))
        .await
    }

    /// Runs the branches in parallel, then asks `aggregator` to merge their
    /// answers.
    ///
    /// Every branch appears in the aggregator input, aborted ones included.
    pub async fn run_parallel_then_aggregate<I, S>(
        &self,
        branches: I,
        aggregator: &Arc<Agent>,
    ) -> FanOutOutcome
    where
        I: IntoIterator<Item = (Arc<Agent>, S)>,
        S: Into<String>,
    {
        let branches: Vec<(Arc<Agent>, String)> = branches
            .into_iter()
            .map(|(agent, input)| (agent, input.into()))
            .collect();
        let names: Vec<AgentName> = branches
            .iter()
            .map(|(agent, _)| agent.name().clone())
            .collect();

        let outcomes = self.run_parallel(branches).await;
        let report = FanOutReport::new(names.into_iter().zip(outcomes).collect());
        let aggregate = self.run(aggregator, report.render()).await;
        FanOutOutcome { report, aggregate }
    }
}

/// Branch outcomes labelled with the agent each branch started on.
#[derive(Debug, Clone, PartialEq)]
pub struct FanOutReport {
    preamble: String,
    branches: Vec<(AgentName, RunOutcome)>,
}

impl FanOutReport {
    /// Wraps labelled outcomes with the default preamble.
    #[must_use]
    pub fn new(branches: Vec<(AgentName, RunOutcome)>) -> Self {
        Self {
            preamble: DEFAULT_AGGREGATION_PREAMBLE.to_owned(),
            branches,
        }
    }

    /// Replaces the preamble.
    #[must_use]
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    /// Returns the labelled outcomes in input order.
    #[must_use]
    pub fn branches(&self) -> &[(AgentName, RunOutcome)] {
        &self.branches
    }

    /// Number of branches that completed.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.branches
            .iter()
            .filter(|(_, outcome)| outcome.is_ok())
            .count()
    }

    /// Renders the aggregator input: the preamble followed by one
    /// upper-cased section per branch.
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = self.preamble.clone();
        for (name, outcome) in &self.branches {
            let body = match outcome {
                Ok(result) => result.final_output().to_owned(),
                Err(aborted) => format!("[no result: {}]", aborted.reason()),
            };
            text.push_str(&format!("\n\n{}:\n{body}", name.as_str().to_uppercase()));
        }
        text
    }
}

/// Result of [`Runner::run_parallel_then_aggregate`].
#[derive(Debug, Clone, PartialEq)]
pub struct FanOutOutcome {
    /// Outcomes of the parallel branches.
    pub report: FanOutReport,
    /// Outcome of the aggregator run.
    pub aggregate: RunOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_adapters::scripted::{ScriptStep, ScriptedGateway};
    use agent_adapters::traits::ModelResponse;
    use std::time::Duration;

    use crate::registry::AgentRegistry;

    fn agent(name: &str) -> Arc<Agent> {
        Arc::new(Agent::builder(name).build().unwrap())
    }

    #[tokio::test]
    async fn outcomes_keep_input_order() {
        let gateway = Arc::new(ScriptedGateway::new());
        for (name, delay) in [("Slow", 40), ("Medium", 20), ("Fast", 1)] {
            gateway
                .push_for(
                    name,
                    ScriptStep::respond(ModelResponse::final_text(name.to_lowercase()))
                        .after(Duration::from_millis(delay)),
                )
                .await;
        }
        let runner = Runner::new(gateway, AgentRegistry::default());

        let outcomes = runner
            .run_parallel([
                (agent("Slow"), "a"),
                (agent("Medium"), "b"),
                (agent("Fast"), "c"),
            ])
            .await;

        let answers: Vec<String> = outcomes
            .into_iter()
            .map(|outcome| outcome.unwrap().into_output())
            .collect();
        assert_eq!(answers, ["slow", "medium", "fast"]);
    }

    #[tokio::test]
    async fn aggregator_sees_every_branch() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway
            .push_for("Sentiment", ModelResponse::final_text("positive"))
            .await;
        gateway
            .push_for("Summary", ModelResponse::final_text("merged"))
            .await;
        let runner = Runner::new(gateway.clone(), AgentRegistry::default());

        let outcome = runner
            .run_parallel_then_aggregate(
                [(agent("Sentiment"), "text"), (agent("Topics"), "text")],
                &agent("Summary"),
            )
            .await;

        assert_eq!(outcome.report.completed(), 1);
        assert_eq!(outcome.aggregate.unwrap().final_output(), "merged");

        let rendered = outcome.report.render();
        assert!(rendered.starts_with(DEFAULT_AGGREGATION_PREAMBLE));
        assert!(rendered.contains("SENTIMENT:\npositive"));
        assert!(rendered.contains("TOPICS:\n[no result:"));

        let requests = gateway.requests().await;
        let summary = requests
            .iter()
            .find(|request| request.agent().as_str() == "Summary")
            .unwrap();
        assert_eq!(summary.last_user_message(), Some(rendered.as_str()));
    }
}
