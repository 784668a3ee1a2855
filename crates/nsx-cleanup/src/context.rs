//! Cancellation and deadline propagation for a teardown run
//!
//! A [`TeardownContext`] is passed by reference through every phase and every
//! per-object loop. Remote calls check it before they start and retry loops
//! race their backoff sleeps against it.

use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context is done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Terminal error returned when work stops because its context is done
///
/// Retry loops never retry past this error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("failed because of timeout\n{0}")]
pub struct TimeoutError(pub ContextError);

/// Cancellation token plus an optional deadline
#[derive(Debug, Clone, Default)]
pub struct TeardownContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl TeardownContext {
    /// A context that is only done once cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now
    ///
    /// A timeout too large to represent as an instant gives a context with no
    /// deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Self::with_deadline(deadline),
            None => Self::new(),
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Derive a context that is cancelled with this one but can also be
    /// cancelled on its own
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The reason this context is done, or `None` while it is still live
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            return Some(ContextError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Fail with a [`TimeoutError`] if the context is done
    pub fn check(&self) -> Result<(), TimeoutError> {
        match self.err() {
            Some(e) => Err(TimeoutError(e)),
            None => Ok(()),
        }
    }

    /// Resolves once the context is cancelled or its deadline passes
    pub async fn done(&self) -> ContextError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => ContextError::Canceled,
                    _ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                ContextError::Canceled
            }
        }
    }

    /// Sleep for `delay` unless the context finishes first
    pub async fn sleep(&self, delay: Duration) -> Result<(), TimeoutError> {
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            e = self.done() => Err(TimeoutError(e)),
        }
    }
}
