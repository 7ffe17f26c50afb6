//! Retry wrapper for transient gateway failures.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::traits::{
    GatewayError, GatewayMetadata, GatewayRequest, GatewayResult, ModelGateway, ModelResponse,
};

/// Capped exponential backoff settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy allowing `max_attempts` total attempts (minimum one).
    #[must_use]
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
        }
    }

    /// Returns the total number of attempts.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `retry` (zero based).
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200), Duration::from_secs(5))
    }
}

/// Gateway that retries transient failures of the wrapped gateway.
///
/// Rate-limit responses carrying a `retry_after` hint wait for the hinted
/// delay (capped by the policy) instead of the computed backoff.
#[derive(Debug)]
pub struct RetryingGateway<G> {
    inner: G,
    policy: RetryPolicy,
}

impl<G> RetryingGateway<G>
where
    G: ModelGateway,
{
    /// Wraps `inner` with the supplied policy.
    #[must_use]
    pub fn new(inner: G, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Returns the wrapped gateway.
    #[must_use]
    pub fn inner(&self) -> &G {
        &self.inner
    }
}

#[async_trait]
impl<G> ModelGateway for RetryingGateway<G>
where
    G: ModelGateway,
{
    fn metadata(&self) -> &GatewayMetadata {
        self.inner.metadata()
    }

    async fn complete(&self, request: GatewayRequest) -> GatewayResult<ModelResponse> {
        let mut retry = 0;
        loop {
            match self.inner.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_transient() && retry + 1 < self.policy.max_attempts => {
                    let delay = match &err {
                        GatewayError::RateLimited {
                            retry_after: Some(hint),
                        } => (*hint).min(self.policy.max_delay),
                        _ => self.policy.backoff(retry),
                    };
                    warn!(
                        provider = self.metadata().provider(),
                        attempt = retry + 1,
                        ?delay,
                        error = %err,
                        "transient gateway failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_primitives::AgentName;

    use crate::scripted::{ScriptStep, ScriptedGateway};
    use crate::traits::Message;

    fn request() -> GatewayRequest {
        GatewayRequest::new(AgentName::new("a").unwrap(), "", vec![Message::user("hi")]).unwrap()
    }

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1), Duration::from_millis(2))
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(250));
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(250));
        assert_eq!(policy.backoff(40), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let gateway = RetryingGateway::new(
            ScriptedGateway::from_steps([
                ScriptStep::fail(GatewayError::transport("reset")),
                ScriptStep::fail(GatewayError::RateLimited {
                    retry_after: Some(Duration::from_millis(1)),
                }),
                ScriptStep::respond(ModelResponse::final_text("ok")),
            ]),
            fast_policy(3),
        );

        let response = gateway.complete(request()).await.unwrap();
        assert_eq!(response.text.as_deref(), Some("ok"));
        assert_eq!(gateway.inner().call_count().await, 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let gateway = RetryingGateway::new(
            ScriptedGateway::from_steps([
                ScriptStep::fail(GatewayError::transport("reset")),
                ScriptStep::fail(GatewayError::transport("reset")),
                ScriptStep::respond(ModelResponse::final_text("never")),
            ]),
            fast_policy(2),
        );

        let err = gateway.complete(request()).await.expect_err("should give up");
        assert!(matches!(err, GatewayError::Transport { .. }));
        assert_eq!(gateway.inner().call_count().await, 2);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let gateway = RetryingGateway::new(
            ScriptedGateway::from_steps([ScriptStep::fail(GatewayError::configuration("no key"))]),
            fast_policy(3),
        );

        let err = gateway.complete(request()).await.expect_err("permanent");
        assert!(matches!(err, GatewayError::Configuration { .. }));
        assert_eq!(gateway.inner().call_count().await, 1);
    }
}
