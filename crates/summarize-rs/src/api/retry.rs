//! Retry with exponential backoff for transient model-API failures.
//!
//! Rate limits (429), server errors (5xx), and network timeouts are retried
//! with exponential backoff and deterministic jitter; 400/401-class errors
//! are never retried. Classification is string-based because the client
//! reports errors as formatted messages (`"Summarizer API HTTP 429: ..."`).

use std::time::Duration;

use tracing::warn;

/// Backoff parameters for retrying a chunk summarization call.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum retries after the initial attempt (0 = fail immediately).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Ceiling on the delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier per attempt.
    pub multiplier: f64,
    /// Spread retries out to avoid synchronized bursts across the fan-out.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        if self.jitter {
            // Deterministic jitter keyed on the attempt number — enough to
            // decorrelate concurrent chunk calls without pulling in rand.
            let factor = match attempt % 4 {
                0 => 0.75,
                1 => 0.90,
                2 => 0.60,
                _ => 0.85,
            };
            Duration::from_secs_f64(capped * factor)
        } else {
            Duration::from_secs_f64(capped)
        }
    }
}

/// Whether an error message indicates a transient (retryable) failure.
pub fn is_transient_error(error: &str) -> bool {
    let transient_statuses = ["429", "500", "502", "503", "504"];
    if transient_statuses
        .iter()
        .any(|s| error.contains(&format!("HTTP {s}")))
    {
        return true;
    }

    let lower = error.to_lowercase();
    [
        "request failed:",
        "connection reset",
        "connection refused",
        "timed out",
        "timeout",
        "broken pipe",
        "network",
    ]
    .iter()
    .any(|p| lower.contains(p))
}

/// Whether an error message indicates a permanent (non-retryable) failure.
pub fn is_permanent_error(error: &str) -> bool {
    [
        "HTTP 400",
        "HTTP 401",
        "HTTP 403",
        "HTTP 404",
        "HTTP 422",
        "invalid",
        "bad request",
        "unauthorized",
    ]
    .iter()
    .any(|p| error.contains(p))
}

/// Run `call`, retrying transient failures per `config`.
pub async fn retry_call<T, F, Fut>(config: &RetryConfig, mut call: F) -> Result<T, String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                if attempt < config.max_retries
                    && is_transient_error(&e)
                    && !is_permanent_error(&e)
                {
                    let delay = config.delay_for_attempt(attempt);
                    warn!(
                        "Transient API error (attempt {}/{}): {e}. Retrying in {delay:?}...",
                        attempt + 1,
                        config.max_retries,
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                } else {
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries: retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            ..Default::default()
        }
    }

    #[test]
    fn default_allows_four_retries() {
        assert_eq!(RetryConfig::default().max_retries, 4);
    }

    #[test]
    fn delay_grows_exponentially() {
        let config = RetryConfig {
            jitter: false,
            ..Default::default()
        };
        let d0 = config.delay_for_attempt(0);
        let d1 = config.delay_for_attempt(1);
        let d2 = config.delay_for_attempt(2);
        assert!(d1 > d0);
        assert!(d2 > d1);
    }

    #[test]
    fn delay_capped_at_max() {
        let config = RetryConfig {
            jitter: false,
            max_delay: Duration::from_secs(2),
            ..Default::default()
        };
        assert!(config.delay_for_attempt(12) <= Duration::from_secs(2));
    }

    #[test]
    fn jitter_never_exceeds_raw_delay() {
        let jittered = RetryConfig::default();
        let plain = RetryConfig {
            jitter: false,
            ..Default::default()
        };
        for attempt in 0..6 {
            assert!(jittered.delay_for_attempt(attempt) <= plain.delay_for_attempt(attempt));
        }
    }

    #[test]
    fn transient_errors_detected() {
        assert!(is_transient_error("Summarizer API HTTP 429: rate limited"));
        assert!(is_transient_error("Summarizer API HTTP 502: bad gateway"));
        assert!(is_transient_error("request failed: connection reset"));
        assert!(is_transient_error("request failed: operation timed out"));
    }

    #[test]
    fn permanent_errors_not_retried() {
        assert!(is_permanent_error("Summarizer API HTTP 401: unauthorized"));
        assert!(!is_transient_error("Summarizer API HTTP 400: bad request"));
        assert!(!is_transient_error("some random error"));
    }

    #[tokio::test]
    async fn retry_call_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = retry_call(&fast(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("Summarizer API HTTP 503: unavailable".to_string())
                } else {
                    Ok("recovered")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("recovered"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_call_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = retry_call(&fast(2), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("Summarizer API HTTP 429: rate limited".to_string()) }
        })
        .await;

        assert!(result.is_err());
        // Initial attempt + 2 retries.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_call_fails_fast_on_permanent_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = retry_call(&fast(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("Summarizer API HTTP 401: unauthorized".to_string()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
