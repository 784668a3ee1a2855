//! Backoff policies and the retry loop shared by every teardown phase
//!
//! Errors are split into two classes. Terminal errors mean the run's context
//! is done and nothing more should be attempted. Everything else is
//! retriable and consumes one backoff step per failed attempt.

use crate::context::{ContextError, TeardownContext, TimeoutError};
use anyhow::Result;
use backon::ExponentialBuilder;
use nsx_cleanup_common::defaults;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Exponential backoff with a bounded number of attempts
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Maximum number of attempts, including the first one
    pub steps: usize,
    /// Delay after the first failure
    pub duration: Duration,
    /// Multiplier applied to the delay after each failure
    pub factor: f64,
    /// Fraction (0.0 - 1.0) of random extra delay
    pub jitter: f64,
    /// Upper bound for a single delay
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            steps: defaults::DEFAULT_BACKOFF_STEPS,
            duration: defaults::DEFAULT_BACKOFF_DURATION,
            factor: defaults::DEFAULT_BACKOFF_FACTOR,
            jitter: defaults::DEFAULT_BACKOFF_JITTER,
            cap: defaults::DEFAULT_BACKOFF_CAP,
        }
    }
}

impl BackoffPolicy {
    /// The small fixed-delay policy used by the load-balancer legacy paths
    pub fn default_retry() -> Self {
        Self {
            steps: defaults::DEFAULT_RETRY_STEPS,
            duration: defaults::DEFAULT_RETRY_DURATION,
            factor: 1.0,
            jitter: defaults::DEFAULT_BACKOFF_JITTER,
            cap: defaults::DEFAULT_BACKOFF_CAP,
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` counts failures so far
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.factor.powi(attempt.saturating_sub(1) as i32);
        let base = self.duration.as_secs_f64() * exp;
        let capped = Duration::from_secs_f64(base.min(self.cap.as_secs_f64()));
        jittered_delay(capped, self.jitter)
    }

    /// Same policy expressed as a `backon` builder
    pub fn builder(&self) -> ExponentialBuilder {
        let builder = ExponentialBuilder::default()
            .with_min_delay(self.duration)
            .with_max_delay(self.cap)
            .with_factor(self.factor as f32)
            .with_max_times(self.steps.saturating_sub(1));
        if self.jitter > 0.0 {
            builder.with_jitter()
        } else {
            builder
        }
    }
}

/// Add jitter to a duration to prevent thundering herd.
fn jittered_delay(base: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor.is_nan() || jitter_factor <= 0.0 {
        return base;
    }
    let jitter = rand::thread_rng().gen_range(0.0..jitter_factor.min(1.0));
    Duration::from_secs_f64(base.as_secs_f64() * (1.0 + jitter))
}

/// Whether an error means the context is done
pub fn is_terminal(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|cause| cause.is::<TimeoutError>() || cause.is::<ContextError>())
}

pub fn is_retriable(error: &anyhow::Error) -> bool {
    !is_terminal(error)
}

/// Run `op` until it succeeds, fails with a non-retriable error, or runs out
/// of backoff steps.
///
/// The context is checked before every attempt and raced against every
/// backoff sleep; once it is done the loop returns a [`TimeoutError`]
/// without attempting again.
pub async fn retry_on_error<T, F, Fut, R>(
    ctx: &TeardownContext,
    policy: &BackoffPolicy,
    retriable: R,
    operation: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    R: Fn(&anyhow::Error) -> bool,
{
    let steps = policy.steps.max(1);
    let mut attempt = 0u32;

    loop {
        ctx.check()?;
        attempt += 1;

        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempts = attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if !retriable(&e) => return Err(e),
            Err(e) if attempt as usize >= steps => {
                warn!(operation, attempts = attempt, error = %e, "Retries exhausted");
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying"
                );
                ctx.sleep(delay).await?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(steps: usize) -> BackoffPolicy {
        BackoffPolicy {
            steps,
            duration: Duration::from_millis(10),
            factor: 2.0,
            jitter: 0.0,
            cap: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = BackoffPolicy {
            steps: 10,
            duration: Duration::from_millis(100),
            factor: 2.0,
            jitter: 0.0,
            cap: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_only_adds() {
        let policy = BackoffPolicy {
            jitter: 0.5,
            ..fast_policy(3)
        };
        for _ in 0..50 {
            let delay = policy.delay_for(1);
            assert!(delay >= Duration::from_millis(10));
            assert!(delay < Duration::from_millis(15));
        }
    }

    #[test]
    fn test_invalid_jitter_is_ignored() {
        let base = Duration::from_millis(10);
        assert_eq!(jittered_delay(base, f64::NAN), base);
        assert_eq!(jittered_delay(base, -1.0), base);

        let delay = jittered_delay(base, f64::INFINITY);
        assert!(delay >= base && delay < base * 2);
    }

    #[test]
    fn test_classification() {
        let timeout = anyhow::Error::new(TimeoutError(ContextError::Canceled));
        assert!(is_terminal(&timeout));
        assert!(is_terminal(&timeout.context("cleaning pools")));
        assert!(is_terminal(&anyhow::Error::new(ContextError::DeadlineExceeded)));
        assert!(is_retriable(&anyhow::anyhow!("server error")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_consumes_one_step() {
        let ctx = TeardownContext::new();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = retry_on_error(&ctx, &fast_policy(5), is_retriable, "test", || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    anyhow::bail!("transient");
                }
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_steps() {
        let ctx = TeardownContext::new();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<()> = retry_on_error(&ctx, &fast_policy(4), is_retriable, "test", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("always fails")
            }
        })
        .await;

        assert_eq!(result.unwrap_err().to_string(), "always fails");
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_not_retried() {
        let ctx = TeardownContext::new();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<()> = retry_on_error(&ctx, &fast_policy(5), is_retriable, "test", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::Error::new(TimeoutError(ContextError::Canceled)))
            }
        })
        .await;

        assert!(is_terminal(&result.unwrap_err()));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_context_never_attempts() {
        let ctx = TeardownContext::new();
        ctx.cancel();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<()> = retry_on_error(&ctx, &fast_policy(5), is_retriable, "test", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "failed because of timeout\ncontext canceled");
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_is_terminal() {
        let ctx = TeardownContext::new();
        let policy = BackoffPolicy {
            duration: Duration::from_secs(60),
            cap: Duration::from_secs(60),
            ..fast_policy(5)
        };
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let canceller = ctx.clone();

        let result: Result<()> = retry_on_error(&ctx, &policy, is_retriable, "test", || {
            let counter = counter.clone();
            let canceller = canceller.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                canceller.cancel();
                anyhow::bail!("transient")
            }
        })
        .await;

        assert!(is_terminal(&result.unwrap_err()));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
