//! Bounded retry with exponential backoff for collaborator calls.
//!
//! Every gateway call runs under a timeout; timeouts and transiently
//! classified failures are retried with exponential backoff up to the
//! configured attempt cap, then escalated. Permanently classified
//! failures are never retried.

use std::future::Future;
use std::time::Duration;
use tidemark_gateways::GatewayError;
use tidemark_types::OrchestratorParams;

/// Retry policy derived from the orchestrator parameters.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub base_delay_ms: u64,
    pub factor: u32,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn from_params(params: &OrchestratorParams) -> Self {
        Self {
            base_delay_ms: params.retry_base_delay_ms,
            factor: params.retry_factor.max(1),
            max_attempts: params.retry_max_attempts.max(1),
        }
    }

    /// Backoff delay after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = u64::from(self.factor).saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// How a retried call ultimately failed.
#[derive(Debug)]
pub enum RetryFailure {
    /// Transient failures exhausted the attempt budget.
    Exhausted { attempts: u32, last: GatewayError },
    /// The collaborator rejected the request; no retry attempted.
    Permanent { attempts: u32, error: GatewayError },
}

impl RetryFailure {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryFailure::Exhausted { attempts, .. } => *attempts,
            RetryFailure::Permanent { attempts, .. } => *attempts,
        }
    }

    pub fn message(&self) -> String {
        match self {
            RetryFailure::Exhausted { attempts, last } => {
                format!("transient failure escalated after {attempts} attempts: {last}")
            }
            RetryFailure::Permanent { error, .. } => error.to_string(),
        }
    }
}

/// Run a collaborator call with timeout, classification, and backoff.
///
/// Returns the value and the number of attempts it took. `label` only
/// feeds the logs.
pub async fn call_with_retry<T, Fut, F>(
    label: &str,
    timeout: Duration,
    policy: &RetryPolicy,
    mut call: F,
) -> Result<(T, u32), RetryFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;

        let failure = match tokio::time::timeout(timeout, call()).await {
            Ok(Ok(value)) => return Ok((value, attempt)),
            Ok(Err(err)) if err.is_transient() => err,
            Ok(Err(err)) => {
                tracing::warn!(call = label, attempt, error = %err, "collaborator rejected call");
                return Err(RetryFailure::Permanent {
                    attempts: attempt,
                    error: err,
                });
            }
            Err(_) => GatewayError::Timeout(timeout.as_secs()),
        };

        if attempt >= policy.max_attempts {
            tracing::error!(
                call = label,
                attempts = attempt,
                error = %failure,
                "retries exhausted, escalating to permanent failure"
            );
            return Err(RetryFailure::Exhausted {
                attempts: attempt,
                last: failure,
            });
        }

        let delay = policy.delay_after(attempt);
        tracing::warn!(
            call = label,
            attempt,
            retry_in_ms = delay.as_millis() as u64,
            error = %failure,
            "transient collaborator failure, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            base_delay_ms: 10,
            factor: 2,
            max_attempts: 5,
        }
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let p = policy();
        assert_eq!(p.delay_after(1), Duration::from_millis(10));
        assert_eq!(p.delay_after(2), Duration::from_millis(20));
        assert_eq!(p.delay_after(4), Duration::from_millis(80));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_first_try_without_sleeping() {
        let (value, attempts) = call_with_retry(
            "test",
            Duration::from_secs(1),
            &policy(),
            || async { Ok::<_, GatewayError>(42) },
        )
        .await
        .unwrap();
        assert_eq!(value, 42);
        assert_eq!(attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_until_success() {
        let counter = AtomicU32::new(0);
        let (value, attempts) = call_with_retry("test", Duration::from_secs(1), &policy(), || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(GatewayError::Unavailable("reset".into()))
                } else {
                    Ok(7)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_stops_immediately() {
        let counter = AtomicU32::new(0);
        let result: Result<(u32, u32), _> =
            call_with_retry("test", Duration::from_secs(1), &policy(), || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(GatewayError::Rejected("bad area".into())) }
            })
            .await;

        match result.unwrap_err() {
            RetryFailure::Permanent { attempts, .. } => assert_eq!(attempts, 1),
            other => panic!("expected permanent failure, got {other:?}"),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_after_max_attempts() {
        let result: Result<(u32, u32), _> =
            call_with_retry("test", Duration::from_secs(1), &policy(), || async {
                Err(GatewayError::Unavailable("down".into()))
            })
            .await;

        match result.unwrap_err() {
            RetryFailure::Exhausted { attempts, .. } => assert_eq!(attempts, 5),
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_calls_time_out_and_count_as_transient() {
        let counter = AtomicU32::new(0);
        let result: Result<(u32, u32), _> = call_with_retry(
            "test",
            Duration::from_millis(50),
            &RetryPolicy {
                base_delay_ms: 10,
                factor: 2,
                max_attempts: 2,
            },
            || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(0)
                }
            },
        )
        .await;

        assert!(matches!(
            result.unwrap_err(),
            RetryFailure::Exhausted { attempts: 2, last: GatewayError::Timeout(_) }
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
