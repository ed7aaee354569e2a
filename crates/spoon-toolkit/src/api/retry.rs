//! Caller-side retry with exponential backoff and jitter.
//!
//! The executor never retries on its own. Callers that want retries wrap a
//! call in [`retry_with_backoff`], which re-invokes it while the result is a
//! transient failure (`RateLimit` or `Transport`) and honors a provider's
//! `Retry-After`. Configuration, validation and provider errors are returned
//! immediately.

use crate::result::ToolResult;
use std::future::Future;
use std::time::Duration;
use tracing::info;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries (0 = no retries, just fail immediately).
    pub max_retries: u32,
    /// Initial delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries. Also caps `Retry-After`.
    pub max_delay: Duration,
    /// Backoff multiplier (typically 2.0 for exponential backoff).
    pub multiplier: f64,
    /// Whether to add jitter to prevent thundering herd.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a config with the given number of retries. Uses sensible defaults.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_retries: retries,
            ..Default::default()
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        if self.jitter {
            // Deterministic per-attempt jitter; avoids a rand dependency.
            let jitter_factor = match attempt % 4 {
                0 => 0.75,
                1 => 0.90,
                2 => 0.60,
                _ => 0.85,
            };
            Duration::from_secs_f64(capped * jitter_factor)
        } else {
            Duration::from_secs_f64(capped)
        }
    }

    /// Delay before retrying after `result`, preferring the provider's
    /// `Retry-After` (capped at `max_delay`) over the computed backoff.
    pub fn delay_after(&self, result: &ToolResult, attempt: u32) -> Duration {
        result
            .metadata()
            .and_then(|m| m.retry_after_secs)
            .map(|secs| Duration::from_secs(secs).min(self.max_delay))
            .unwrap_or_else(|| self.delay_for_attempt(attempt))
    }
}

/// Whether a result is a transient failure worth retrying.
pub fn is_retryable(result: &ToolResult) -> bool {
    result.error_kind().is_some_and(|k| k.is_transient())
}

/// Run `call` until it succeeds, fails permanently, or retries run out.
/// Returns the last result.
pub async fn retry_with_backoff<F, Fut>(config: &RetryConfig, mut call: F) -> ToolResult
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ToolResult>,
{
    let mut attempt = 0;
    loop {
        let result = call().await;
        if !is_retryable(&result) || attempt >= config.max_retries {
            return result;
        }
        let delay = config.delay_after(&result, attempt);
        info!(
            "Retrying after {} (attempt {}/{}, waiting {:.1}s)",
            result.error().unwrap_or_default(),
            attempt + 1,
            config.max_retries,
            delay.as_secs_f64()
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{ResultMetadata, ToolError};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn default_config_no_retries() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn with_retries_sets_count() {
        let config = RetryConfig::with_retries(3);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn delay_increases_exponentially() {
        let config = RetryConfig {
            jitter: false,
            ..RetryConfig::with_retries(5)
        };
        let d0 = config.delay_for_attempt(0);
        let d1 = config.delay_for_attempt(1);
        let d2 = config.delay_for_attempt(2);

        assert!(d1 > d0, "d1={d1:?} should be > d0={d0:?}");
        assert!(d2 > d1, "d2={d2:?} should be > d1={d1:?}");
    }

    #[test]
    fn delay_capped_at_max() {
        let config = RetryConfig {
            jitter: false,
            max_delay: Duration::from_secs(2),
            ..RetryConfig::with_retries(10)
        };
        let d10 = config.delay_for_attempt(10);
        assert!(d10 <= Duration::from_secs(2));
    }

    #[test]
    fn retry_after_preferred_and_capped() {
        let config = RetryConfig::with_retries(3);
        let throttled = ToolResult::failure(ToolError::RateLimited {
            provider: "p".into(),
            message: "slow".into(),
            retry_after: Some(Duration::from_secs(3)),
        });
        assert_eq!(config.delay_after(&throttled, 0), Duration::from_secs(3));

        let long = ToolResult::failure(ToolError::Network("reset".into()))
            .with_metadata(ResultMetadata::now().retry_after_secs(3600));
        assert_eq!(config.delay_after(&long, 0), config.max_delay);
    }

    #[test]
    fn retryability_follows_kind() {
        assert!(is_retryable(&ToolResult::failure(ToolError::Timeout(
            Duration::from_secs(1)
        ))));
        assert!(!is_retryable(&ToolResult::failure(
            ToolError::MissingCredential("K".into())
        )));
        assert!(!is_retryable(&ToolResult::success(json!(1))));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::with_retries(3);
        let result = retry_with_backoff(&config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    ToolResult::failure(ToolError::Network("connection reset".into()))
                } else {
                    ToolResult::success(json!("ok"))
                }
            }
        })
        .await;
        assert!(result.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_not_retried() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::with_retries(5);
        let result = retry_with_backoff(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { ToolResult::failure(ToolError::invalid_argument("chain", "unknown")) }
        })
        .await;
        assert!(!result.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::with_retries(2);
        let result = retry_with_backoff(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { ToolResult::failure(ToolError::Timeout(Duration::from_secs(30))) }
        })
        .await;
        assert_eq!(result.error_kind(), Some(crate::result::ToolErrorKind::Transport));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
