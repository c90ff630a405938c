//! Bounded retry for transient provider failures
//!
//! Distinct from channel-health retry: this covers network blips and rate
//! limits at a single call site, with a small fixed number of extra attempts
//! and an increasing delay. Terminal errors (quota exhausted, not found)
//! are returned immediately.

use provider_youtube::YouTubeError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run `operation`, retrying transient failures up to `extra_attempts`
/// additional times with a delay that grows linearly per attempt.
pub async fn with_transient_retry<T, F, Fut>(
    op_name: &str,
    extra_attempts: u32,
    base_delay: Duration,
    mut operation: F,
) -> std::result::Result<T, YouTubeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, YouTubeError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < extra_attempts => {
                attempt += 1;
                let delay = base_delay * attempt;
                warn!(
                    op_name,
                    attempt,
                    extra_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient provider failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => return Err(error),
        }
    }
}
