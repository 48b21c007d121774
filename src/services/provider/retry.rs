//! # RPC Retry Module
//!
//! Retries transient RPC failures with exponential backoff and randomized jitter.
//!
//! - [`RetryConfig`]: retry count and delay bounds
//! - [`retry_rpc_call`]: runs an operation until it succeeds, fails permanently, or runs out of attempts
//! - [`calculate_retry_delay`]: backoff delay for a given attempt
use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::constants::RETRY_JITTER_PERCENT;

/// Calculate the retry delay using exponential backoff with jitter
///
/// # Arguments
/// * `attempt` - The retry attempt number (0 = first retry)
/// * `base_delay_ms` - Base delay in milliseconds
/// * `max_delay_ms` - Maximum delay in milliseconds
pub fn calculate_retry_delay(attempt: u8, base_delay_ms: u64, max_delay_ms: u64) -> Duration {
    if base_delay_ms == 0 || max_delay_ms == 0 {
        return Duration::from_millis(0);
    }

    let exp_backoff = if attempt > 63 {
        max_delay_ms
    } else {
        let multiplier = 1u64.checked_shl(attempt as u32).unwrap_or(u64::MAX);
        base_delay_ms.saturating_mul(multiplier)
    };

    apply_jitter(exp_backoff.min(max_delay_ms))
}

/// Randomizes `delay_ms` within `delay_ms × (1 ± RETRY_JITTER_PERCENT)`.
fn apply_jitter(delay_ms: u64) -> Duration {
    if delay_ms == 0 {
        return Duration::from_millis(0);
    }

    let jitter_range = (delay_ms as f64 * RETRY_JITTER_PERCENT).floor() as u64;
    if jitter_range == 0 {
        return Duration::from_millis(delay_ms);
    }

    let mut rng = rand::rng();
    let jitter_value = rng.random_range(0..=jitter_range);

    let final_delay = if rng.random_bool(0.5) {
        delay_ms.saturating_add(jitter_value)
    } else {
        delay_ms.saturating_sub(jitter_value)
    };

    Duration::from_millis(final_delay)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_retries: u8,
    /// Base delay in milliseconds for exponential backoff
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds for exponential backoff
    pub max_delay_ms: u64,
}

impl RetryConfig {
    /// A maximum delay below the base delay is raised to the base delay.
    pub fn new(max_retries: u8, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms: max_delay_ms.max(base_delay_ms),
        }
    }

    pub fn from_env() -> Self {
        let config = ServerConfig::from_env();
        Self::new(
            config.provider_max_retries,
            config.provider_retry_base_delay_ms,
            config.provider_retry_max_delay_ms,
        )
    }
}

/// Runs `operation` until it succeeds, returns a non-retriable error, or the attempts run out.
///
/// The last error is returned when every attempt failed.
pub async fn retry_rpc_call<T, E, F, Fut>(
    operation_name: &str,
    is_retriable_error: impl Fn(&E) -> bool,
    operation: F,
    config: &RetryConfig,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = config.max_retries.max(1);
    let mut attempt: u8 = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    log::debug!(
                        "RPC call '{}' succeeded (attempt {}/{})",
                        operation_name,
                        attempt,
                        max_attempts
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                let retriable = is_retriable_error(&e);
                if !retriable || attempt >= max_attempts {
                    if retriable {
                        log::error!(
                            "RPC call '{}' failed after {} attempts: {}",
                            operation_name,
                            attempt,
                            e
                        );
                    }
                    return Err(e);
                }

                let delay =
                    calculate_retry_delay(attempt - 1, config.base_delay_ms, config.max_delay_ms);
                log::warn!(
                    "RPC call '{}' failed (attempt {}/{}): {}. Retrying in {:?}",
                    operation_name,
                    attempt,
                    max_attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
