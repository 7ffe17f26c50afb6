//! Bounded task spawning for fan-out branches.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const DEFAULT_CONCURRENCY: NonZeroUsize = match NonZeroUsize::new(32) {
    Some(limit) => limit,
    None => NonZeroUsize::MIN,
};

/// Maximum number of branches allowed to run at once.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    max_concurrency: NonZeroUsize,
}

impl SchedulerConfig {
    /// Creates a configuration with the supplied concurrency limit.
    #[must_use]
    pub const fn new(max_concurrency: NonZeroUsize) -> Self {
        Self { max_concurrency }
    }

    /// Creates a configuration from a plain count, treating zero as one.
    #[must_use]
    pub fn from_limit(limit: usize) -> Self {
        Self::new(NonZeroUsize::new(limit).unwrap_or(NonZeroUsize::MIN))
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub const fn max_concurrency(self) -> NonZeroUsize {
        self.max_concurrency
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

/// Spawns branch futures onto the runtime while capping how many of them make
/// progress at once.
///
/// Tasks are spawned immediately and queue for a permit inside the task, so
/// [`TaskScheduler::spawn`] never blocks the caller. A queued task gives up as
/// soon as its cancellation token fires; it never starts its future.
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    permits: Arc<Semaphore>,
    config: SchedulerConfig,
}

impl TaskScheduler {
    /// Constructs a scheduler using the provided configuration.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(config.max_concurrency().get())),
            config,
        }
    }

    /// Returns the associated configuration.
    #[must_use]
    pub const fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// Number of permits not currently held by a running task.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Spawns `future` once a permit is free.
    ///
    /// The task resolves to [`SchedulerError::Cancelled`] when `cancellation`
    /// fires before a permit is granted. A future that already started is
    /// not interrupted here; it observes the token itself.
    pub fn spawn<F, T>(
        &self,
        cancellation: &CancellationToken,
        future: F,
    ) -> JoinHandle<SchedulerResult<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let cancellation = cancellation.clone();
        tokio::spawn(async move {
            let permit = tokio::select! {
                biased;
                () = cancellation.cancelled() => None,
                permit = permits.acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                return Err(SchedulerError::Cancelled);
            };
            let output = future.await;
            drop(permit);
            Ok(output)
        })
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

/// Errors produced by the scheduler.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// The branch was cancelled while it waited for a permit.
    #[error("cancelled before a permit was granted")]
    Cancelled,
}

/// Result alias for scheduled tasks.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn respects_max_concurrency() {
        let scheduler = TaskScheduler::new(SchedulerConfig::from_limit(2));
        let token = CancellationToken::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let in_flight = Arc::clone(&in_flight);
                let max_seen = Arc::clone(&max_seen);
                scheduler.spawn(&token, async move {
                    let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(current, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.available(), 2);
    }

    #[tokio::test]
    async fn queued_task_stops_waiting_when_cancelled() {
        let scheduler = TaskScheduler::new(SchedulerConfig::from_limit(1));
        let token = CancellationToken::new();
        let started = Arc::new(AtomicUsize::new(0));

        let running = scheduler.spawn(&token, tokio::time::sleep(Duration::from_millis(200)));
        tokio::task::yield_now().await;
        let counter = Arc::clone(&started);
        let queued = scheduler.spawn(&token, async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        token.cancel();
        let outcome = tokio::time::timeout(Duration::from_millis(50), queued)
            .await
            .expect("queued task should not wait for the running one")
            .unwrap();
        assert_eq!(outcome, Err(SchedulerError::Cancelled));
        assert_eq!(started.load(Ordering::SeqCst), 0);
        assert_eq!(running.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn cancelled_token_skips_the_future() {
        let scheduler = TaskScheduler::default();
        let token = CancellationToken::new();
        token.cancel();

        let outcome = scheduler.spawn(&token, async { 7 }).await.unwrap();
        assert_eq!(outcome, Err(SchedulerError::Cancelled));
    }

    #[test]
    fn zero_limit_is_clamped() {
        assert_eq!(SchedulerConfig::from_limit(0).max_concurrency().get(), 1);
    }
}
