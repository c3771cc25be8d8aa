//! Retry wrapper for requests that are expected to time out now and then.
//!
//! Attempt `n` (1-based) runs with a window of `n × base`. The window is
//! handed to the request so it can build a node handle with a matching
//! client timeout. A timeout, whether the window elapsing or the request
//! itself reporting `ApiError::Timeout`, moves on to the next attempt. Any
//! other error is returned immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::ApiError;

pub async fn with_request_timeouts<T, F, Fut>(
    base: Duration,
    max_attempts: u32,
    mut request: F,
) -> Result<T, ApiError>
where
    F: FnMut(Duration) -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    for attempt in 1..=max_attempts.max(1) {
        let window = base * attempt;
        match tokio::time::timeout(window, request(window)).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) if e.is_timeout() => {
                tracing::warn!(attempt, window_ms = window.as_millis() as u64, "request timed out");
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                tracing::warn!(
                    attempt,
                    window_ms = window.as_millis() as u64,
                    "request window elapsed"
                );
            }
        }
    }
    Err(ApiError::Timeout)
}
