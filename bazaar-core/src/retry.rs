//! Retry-once policy for transient outward I/O.
//!
//! Orchestrator and storage calls are retried exactly once with a jittered
//! backoff before the failure is surfaced as `DependencyUnavailable`. Anything
//! stricter is the caller's business.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Base delay before the single retry attempt.
const RETRY_BASE: Duration = Duration::from_millis(250);
/// Upper bound of the random jitter added to [`RETRY_BASE`].
const RETRY_JITTER_MS: u64 = 250;

/// Run `op`, and on failure run it once more after a jittered backoff.
///
/// The factory is invoked per attempt so the future is freshly constructed
/// for the retry.
///
/// # Example
///
/// ```ignore
/// let info = retry_once(|| orchestrator.job_info(&job_name)).await?;
/// ```
pub async fn retry_once<T, E, F, Fut>(mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(first) => {
            let jitter = rand::thread_rng().gen_range(0..RETRY_JITTER_MS);
            let delay = RETRY_BASE + Duration::from_millis(jitter);
            tracing::warn!(error = %first, delay_ms = delay.as_millis() as u64, "retrying after transient failure");
            tokio::time::sleep(delay).await;
            op().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn succeeds_first_try_without_retrying() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = calls.clone();
        let result: Result<u32, String> = retry_once(move || {
            let calls = calls_in.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_exactly_once_then_surfaces_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = calls.clone();
        let result: Result<u32, String> = retry_once(move || {
            let calls = calls_in.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("down".to_string())
            }
        })
        .await;
        assert_eq!(result.unwrap_err(), "down");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn second_attempt_can_recover() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = calls.clone();
        let result: Result<u32, String> = retry_once(move || {
            let calls = calls_in.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err("flake".to_string())
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }
}
