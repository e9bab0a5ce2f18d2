//! Bounded retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Initial delay between retries in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Backoff multiplier (delay *= multiplier after each retry).
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Maximum delay between retries.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    5000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// No delay between attempts; for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: 0,
            backoff_multiplier: 1.0,
            max_delay_ms: 0,
        }
    }

    fn next_delay(&self, delay_ms: u64) -> u64 {
        (((delay_ms as f64) * self.backoff_multiplier) as u64).min(self.max_delay_ms)
    }
}

/// Execute an async operation with retry.
///
/// Errors for which `retryable` returns false are returned immediately.
pub async fn with_retry<F, Fut, T, E, R>(
    config: &RetryConfig,
    retryable: R,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let mut delay_ms = config.initial_delay_ms;
    let mut attempts = 0;

    loop {
        attempts += 1;
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if attempts >= config.max_attempts.max(1) || !retryable(&e) => return Err(e),
            Err(e) => {
                tracing::warn!(attempt = attempts, "Retrying after error: {}", e);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                delay_ms = config.next_delay(delay_ms);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_retry_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_delay_ms, 500);
        assert_eq!(config.next_delay(500), 1000);
        assert_eq!(config.next_delay(4000), 5000);
    }

    #[tokio::test]
    async fn test_with_retry_success() {
        let attempts = AtomicU32::new(0);

        let result: Result<i32, &str> = with_retry(&RetryConfig::immediate(3), |_| true, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_failure_then_success() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<i32, &str> = with_retry(&RetryConfig::immediate(3), |_| true, || {
            let current = attempts_clone.fetch_add(1, Ordering::SeqCst);
            async move {
                if current < 2 {
                    Err("not yet")
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_exhaustion_returns_last_error() {
        let attempts = AtomicU32::new(0);

        let result: Result<i32, String> = with_retry(&RetryConfig::immediate(3), |_| true, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move { Err(format!("failure {}", n)) }
        })
        .await;

        assert_eq!(result, Err("failure 2".to_string()));
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let attempts = AtomicU32::new(0);

        let result: Result<i32, &str> =
            with_retry(&RetryConfig::immediate(5), |e| *e != "fatal", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal") }
            })
            .await;

        assert_eq!(result, Err("fatal"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
