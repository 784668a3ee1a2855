//! NSX API error classification
//!
//! Classification is done on the HTTP status the manager answered with, not
//! on message text.

use thiserror::Error;

/// NSX API error categories for retry and cleanup logic
#[derive(Debug, Error)]
pub enum NsxApiError {
    /// Object does not exist (already deleted, safe to skip in cleanup)
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Manager rate limit exceeded (retryable with backoff)
    #[error("Rate limit exceeded")]
    Throttled,

    /// Manager temporarily unavailable (retryable with backoff)
    #[error("Service unavailable")]
    ServiceUnavailable,

    /// Any other API failure
    #[error("NSX API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl NsxApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, NsxApiError::NotFound(_))
    }

    /// Errors the legacy default-retry path retries
    pub fn is_retryable(&self) -> bool {
        matches!(self, NsxApiError::Throttled | NsxApiError::ServiceUnavailable)
    }
}

/// Classify an NSX API response status.
pub fn classify_status(status: u16, message: impl Into<String>) -> NsxApiError {
    match status {
        404 => NsxApiError::NotFound(message.into()),
        429 => NsxApiError::Throttled,
        503 => NsxApiError::ServiceUnavailable,
        _ => NsxApiError::Api {
            status,
            message: message.into(),
        },
    }
}

/// Find the first [`NsxApiError`] in an error chain.
pub fn classify_anyhow_error(error: &anyhow::Error) -> Option<&NsxApiError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<NsxApiError>())
}

/// Whether the legacy default-retry path should retry this error
pub fn is_retryable_api_error(error: &anyhow::Error) -> bool {
    classify_anyhow_error(error).is_some_and(NsxApiError::is_retryable)
}

/// Turn a "not found" failure into `Ok(None)`.
///
/// Deleting something that is already gone is success for teardown.
pub fn ignore_not_found<T>(result: anyhow::Result<T>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if classify_anyhow_error(&e).is_some_and(NsxApiError::is_not_found) => Ok(None),
        Err(e) => Err(e),
    }
}
