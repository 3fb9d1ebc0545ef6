use std::future::Future;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Doubles after every failed attempt, up to `max_backoff`.
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(800),
        }
    }
}

/// Runs `op` until it succeeds, fails with a non-transient error, or the
/// retry budget is spent. The last error is returned.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: RetryPolicy,
    is_transient: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut backoff = policy.initial_backoff;
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_retries && is_transient(&err) => {
                attempt += 1;
                debug!(
                    "retry attempt {}/{} after {:?}",
                    attempt, policy.max_retries, backoff
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(policy.max_backoff);
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn recovers_from_transient_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_with_backoff(
            RetryPolicy::default(),
            |_| true,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { if n < 3 { Err("busy") } else { Ok(n) } }
            },
        )
        .await;

        assert_eq!(result, Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = retry_with_backoff(
            RetryPolicy::default(),
            |err| *err != "denied",
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("denied") }
            },
        )
        .await;

        assert_eq!(result, Err("denied"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 2,
            ..RetryPolicy::default()
        };
        let result: Result<(), &str> = retry_with_backoff(policy, |_| true, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("busy") }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
