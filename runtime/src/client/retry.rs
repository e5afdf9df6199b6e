//! Exponential backoff with jitter for build service calls.

use std::future::Future;
use std::time::Duration;

use a3s_forge_core::config::RetryConfig;
use a3s_forge_core::error::{ForgeError, Result};
use rand::Rng;

/// Per-call retry bookkeeping.
#[derive(Debug, Default)]
struct RetryState {
    /// Attempts made so far
    attempts: u32,
    /// Delay before the next attempt
    next_delay: Duration,
}

/// Delay before retry `retry` (0-based) for a given jitter sample `u` in [-1, 1].
///
/// `min(max_delay, initial_delay * 2^retry) * (1 + jitter * u)`
pub fn backoff_delay(config: &RetryConfig, retry: u32, u: f64) -> Duration {
    let factor = 2u32.saturating_pow(retry);
    let base = config
        .initial_delay()
        .saturating_mul(factor)
        .min(config.max_delay());
    let scale = (1.0 + config.jitter * u.clamp(-1.0, 1.0)).max(0.0);
    Duration::from_nanos((base.as_nanos() as f64 * scale).round() as u64)
}

/// Backoff delay with a random jitter sample.
fn jittered_delay(config: &RetryConfig, retry: u32) -> Duration {
    let u: f64 = rand::thread_rng().gen_range(-1.0..=1.0);
    backoff_delay(config, retry, u)
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` attempts have failed.
///
/// Non-retryable errors are returned as-is; exhaustion wraps the last error
/// in [`ForgeError::RetryExhausted`].
pub async fn execute<T, F, Fut, P>(
    config: &RetryConfig,
    is_retryable: P,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&ForgeError) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut state = RetryState::default();

    loop {
        state.attempts += 1;
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !is_retryable(&err) {
            return Err(err);
        }
        if state.attempts >= max_attempts {
            return Err(ForgeError::RetryExhausted {
                attempts: state.attempts,
                source: Box::new(err),
            });
        }

        state.next_delay = jittered_delay(config, state.attempts - 1);
        tracing::debug!(
            attempt = state.attempts,
            max_attempts,
            delay_ms = state.next_delay.as_millis() as u64,
            error = %err,
            "Retrying build service request"
        );
        tokio::time::sleep(state.next_delay).await;
    }
}
