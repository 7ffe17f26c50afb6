//! Concurrency-limited gateway wrapper.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::traits::{
    GatewayError, GatewayMetadata, GatewayRequest, GatewayResult, ModelGateway, ModelResponse,
};

/// Bounds the number of outstanding calls to the wrapped gateway.
///
/// Parallel runs share one backend client; wrapping it here keeps fan-out and
/// concurrent tool dispatch from flooding the provider.
#[derive(Debug)]
pub struct LimitedGateway<G> {
    inner: G,
    permits: Arc<Semaphore>,
    limit: NonZeroUsize,
}

impl<G> LimitedGateway<G>
where
    G: ModelGateway,
{
    /// Wraps `inner`, allowing at most `limit` concurrent calls.
    #[must_use]
    pub fn new(inner: G, limit: NonZeroUsize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(limit.get())),
            limit,
        }
    }

    /// Returns the configured limit.
    #[must_use]
    pub const fn limit(&self) -> NonZeroUsize {
        self.limit
    }

    /// Returns the number of calls that could start right now.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Returns the wrapped gateway.
    #[must_use]
    pub fn inner(&self) -> &G {
        &self.inner
    }
}

#[async_trait]
impl<G> ModelGateway for LimitedGateway<G>
where
    G: ModelGateway,
{
    fn metadata(&self) -> &GatewayMetadata {
        self.inner.metadata()
    }

    async fn complete(&self, request: GatewayRequest) -> GatewayResult<ModelResponse> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| GatewayError::transport("gateway limiter closed"))?;
        self.inner.complete(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use agent_primitives::AgentName;

    use crate::traits::Message;

    struct SlowGateway {
        metadata: GatewayMetadata,
        in_flight: AtomicUsize,
        max_seen: AtomicUsize,
    }

    #[async_trait]
    impl ModelGateway for SlowGateway {
        fn metadata(&self) -> &GatewayMetadata {
            &self.metadata
        }

        async fn complete(&self, _request: GatewayRequest) -> GatewayResult<ModelResponse> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(ModelResponse::final_text("ok"))
        }
    }

    #[tokio::test]
    async fn respects_limit() {
        let gateway = Arc::new(LimitedGateway::new(
            SlowGateway {
                metadata: GatewayMetadata::new("test", "slow"),
                in_flight: AtomicUsize::new(0),
                max_seen: AtomicUsize::new(0),
            },
            NonZeroUsize::new(2).unwrap(),
        ));

        let calls = (0..5).map(|_| {
            let gateway = Arc::clone(&gateway);
            async move {
                let request = GatewayRequest::new(
                    AgentName::new("a").unwrap(),
                    "",
                    vec![Message::user("hi")],
                )
                .unwrap();
                gateway.complete(request).await
            }
        });

        let results = futures::future::join_all(calls).await;
        assert!(results.iter().all(Result::is_ok));
        assert_eq!(gateway.inner().max_seen.load(Ordering::SeqCst), 2);
        assert_eq!(gateway.available(), 2);
    }
}
