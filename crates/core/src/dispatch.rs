//! Bounded-concurrency, bounded-retry execution of provider calls.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::core::error::SdkError;
use crate::core::retry::{retry_with_backoff, RetryConfig};

/// Runs provider calls under a shared concurrency limit and retry budget.
///
/// Clones share the same semaphore, so every model handle built from one
/// dispatcher competes for the same slots.
#[derive(Debug, Clone, Default)]
pub struct RequestDispatcher {
    limiter: Option<Arc<Semaphore>>,
    retry: RetryConfig,
}

impl RequestDispatcher {
    /// `max_concurrency` of `None` (or 0) means unbounded.
    pub fn new(max_retries: u32, max_concurrency: Option<usize>) -> Self {
        Self {
            limiter: max_concurrency
                .filter(|n| *n > 0)
                .map(|n| Arc::new(Semaphore::new(n))),
            retry: RetryConfig::with_max_retries(max_retries),
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Number of free slots, or `None` when unbounded.
    pub fn available_permits(&self) -> Option<usize> {
        self.limiter.as_ref().map(|s| s.available_permits())
    }

    /// Execute `operation`, retrying retryable failures.
    ///
    /// A token that is already cancelled rejects before any slot is taken.
    /// Cancellation while queued, in flight or backing off resolves to
    /// [`SdkError::Cancelled`] and drops the pending attempt.
    pub async fn call<F, Fut, T>(
        &self,
        signal: Option<&CancellationToken>,
        operation: F,
    ) -> Result<T, SdkError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SdkError>>,
    {
        if signal.is_some_and(|t| t.is_cancelled()) {
            return Err(SdkError::Cancelled);
        }
        let guarded = async {
            let _permit = match &self.limiter {
                Some(sem) => Some(
                    sem.acquire()
                        .await
                        .map_err(|_| SdkError::Cancelled)?,
                ),
                None => None,
            };
            retry_with_backoff(self.retry.clone(), operation, |attempt, delay, err| {
                warn!(
                    "[DISPATCH]: attempt {} failed, retrying in {:?}: {}",
                    attempt,
                    delay,
                    err.format_details()
                );
            })
            .await
        };
        match signal {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(SdkError::Cancelled),
                    res = guarded => res,
                }
            }
            None => guarded.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn pre_cancelled_token_never_runs_operation() {
        let dispatcher = RequestDispatcher::default();
        let token = CancellationToken::new();
        token.cancel();
        let ran = AtomicU32::new(0);
        let res: Result<(), SdkError> = dispatcher
            .call(Some(&token), || {
                ran.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;
        assert!(matches!(res, Err(SdkError::Cancelled)));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_mid_flight_wins_over_pending_call() {
        let dispatcher = RequestDispatcher::default();
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            child.cancel();
        });
        let res: Result<(), SdkError> = dispatcher
            .call(Some(&token), || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;
        assert!(res.unwrap_err().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_retry_backoff() {
        let dispatcher = RequestDispatcher::new(5, None);
        let token = CancellationToken::new();
        let child = token.clone();
        let attempts = AtomicU32::new(0);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            child.cancel();
        });
        let res: Result<(), SdkError> = dispatcher
            .call(Some(&token), || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(SdkError::Timeout) }
            })
            .await;
        assert!(res.unwrap_err().is_cancelled());
        // first attempt, 1s backoff, second attempt, then cancelled during the 2s backoff
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausted_budget_surfaces_last_error() {
        let dispatcher = RequestDispatcher::new(0, None);
        let res: Result<(), SdkError> = dispatcher
            .call(None, || async {
                Err(SdkError::Upstream {
                    status: 500,
                    message: "boom".into(),
                    source: None,
                })
            })
            .await;
        match res {
            Err(SdkError::Upstream { message, .. }) => assert_eq!(message, "boom"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn concurrency_bound_limits_in_flight_calls() {
        let dispatcher = RequestDispatcher::new(0, Some(2));
        assert_eq!(dispatcher.available_permits(), Some(2));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let calls = (0..6).map(|_| {
            let d = dispatcher.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                d.call(None, || {
                    let in_flight = in_flight.clone();
                    let peak = peak.clone();
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, SdkError>(())
                    }
                })
                .await
            }
        });
        futures_util::future::try_join_all(calls).await.unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(dispatcher.available_permits(), Some(2));
    }
}
