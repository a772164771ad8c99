//! Retry backoff with jitter

use rand::Rng;
use std::time::Duration;

use crate::error::PipelineError;

/// Exponential backoff with full jitter: uniform in
/// `[0, base · 2^attempt]`, capped at 30 s.
pub fn backoff_delay(attempt: u32, base_ms: u64) -> Duration {
    let ceiling_ms = base_ms.saturating_mul(1_u64 << attempt.min(10)).min(30_000);
    let jittered = rand::thread_rng().gen_range(0..=ceiling_ms);
    Duration::from_millis(jittered)
}

/// Delay before retrying a transient error: rate limits honor the
/// provider's requested delay, everything else gets jittered backoff.
pub fn delay_for_error(error: &PipelineError, attempt: u32, base_ms: u64) -> Duration {
    match error {
        PipelineError::RateLimited { retry_after_secs } => Duration::from_secs(*retry_after_secs),
        _ => backoff_delay(attempt, base_ms),
    }
}
