//! Retry with exponential backoff and jitter

use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use vellum_oracle::{ErrorClass, ErrorClassifier};

/// Highest exponent applied to the base delay
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Backoff settings for one retried operation
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound of uniform random jitter
    pub max_jitter: Duration,
    /// Extra multiplier for rate-limit failures
    pub rate_limit_multiplier: u32,
}

impl RetryPolicy {
    /// Policy from the extractor configuration
    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.base_delay(),
            max_jitter: config.max_jitter(),
            rate_limit_multiplier: config.rate_limit_multiplier,
        }
    }

    /// Delay before the retry that follows failed attempt `attempt` (0-based)
    ///
    /// `base * 2^attempt + jitter`, multiplied for rate-limit failures.
    pub fn delay(&self, attempt: u32, class: ErrorClass) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        self.backoff(attempt, class, jitter)
    }

    fn backoff(&self, attempt: u32, class: ErrorClass, jitter: Duration) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(1u32 << attempt.min(MAX_BACKOFF_EXPONENT));
        let delay = exponential.saturating_add(jitter);
        match class {
            ErrorClass::RateLimited => delay.saturating_mul(self.rate_limit_multiplier),
            _ => delay,
        }
    }
}

/// Outcome of a retried operation
#[derive(Debug)]
pub struct Attempted<T> {
    /// Final value or the last error
    pub outcome: Result<T, ExtractorError>,
    /// Attempts made (oracle calls, for oracle operations)
    pub attempts: u32,
}

/// Classify an extractor error for retry purposes
///
/// Parse failures are retried like transient call failures; oracle errors
/// go through the classifier.
pub fn classify(classifier: &dyn ErrorClassifier, error: &ExtractorError) -> ErrorClass {
    match error {
        ExtractorError::Payload(_) => ErrorClass::Transient,
        ExtractorError::Oracle(message) => classifier.classify(message),
        other => classifier.classify(&other.to_string()),
    }
}

/// Run `operation` until it succeeds, fails fatally, or retries run out
///
/// A failure that keeps recurring costs exactly `max_retries + 1` attempts.
/// The one exception is a failure the classifier calls `Fatal` (bad
/// credentials, permission denied): no attempt can succeed, so the loop stops
/// after that attempt. The caller sees the same `Err` outcome either way.
/// Sleeps only between attempts. The closure receives the 0-based attempt
/// number.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    classifier: &dyn ErrorClassifier,
    mut operation: F,
) -> Attempted<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ExtractorError>>,
{
    let mut attempt = 0;
    loop {
        let error = match operation(attempt).await {
            Ok(value) => {
                return Attempted {
                    outcome: Ok(value),
                    attempts: attempt + 1,
                }
            }
            Err(e) => e,
        };

        let class = classify(classifier, &error);
        if class == ErrorClass::Fatal || attempt >= policy.max_retries {
            tracing::warn!(
                attempt = attempt + 1,
                class = %class,
                error = %error,
                "Giving up"
            );
            return Attempted {
                outcome: Err(error),
                attempts: attempt + 1,
            };
        }

        let delay = policy.delay(attempt, class);
        tracing::warn!(
            attempt = attempt + 1,
            max = policy.max_retries + 1,
            class = %class,
            backoff_ms = delay.as_millis() as u64,
            error = %error,
            "Retrying after failure"
        );
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use vellum_oracle::SubstringClassifier;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
            rate_limit_multiplier: 2,
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let p = RetryPolicy {
            base_delay: Duration::from_millis(2000),
            ..policy(3)
        };
        assert_eq!(p.backoff(0, ErrorClass::Transient, Duration::ZERO), Duration::from_millis(2000));
        assert_eq!(p.backoff(2, ErrorClass::Transient, Duration::ZERO), Duration::from_millis(8000));
        assert_eq!(
            p.backoff(1, ErrorClass::Transient, Duration::from_millis(300)),
            Duration::from_millis(4300)
        );
    }

    #[test]
    fn test_rate_limit_multiplier() {
        let p = RetryPolicy {
            base_delay: Duration::from_millis(1000),
            ..policy(3)
        };
        assert_eq!(p.backoff(1, ErrorClass::RateLimited, Duration::ZERO), Duration::from_millis(4000));
    }

    #[test]
    fn test_jitter_bounded() {
        let p = RetryPolicy {
            base_delay: Duration::from_millis(100),
            max_jitter: Duration::from_millis(50),
            ..policy(3)
        };
        for _ in 0..100 {
            let d = p.delay(0, ErrorClass::Transient);
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(150));
        }
    }

    #[test]
    fn test_huge_attempt_saturates() {
        let p = RetryPolicy {
            base_delay: Duration::from_secs(1),
            ..policy(100)
        };
        assert!(p.backoff(90, ErrorClass::RateLimited, Duration::ZERO) >= Duration::from_secs(65_536));
    }

    #[tokio::test]
    async fn test_exhausts_after_max_retries_plus_one() {
        let calls = AtomicU32::new(0);
        let classifier = SubstringClassifier::default();
        let result: Attempted<()> = with_retry(&policy(3), &classifier, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ExtractorError::Oracle("503 unavailable".to_string())) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(result.attempts, 4);
        assert!(result.outcome.is_err());
    }

    #[tokio::test]
    async fn test_digits_in_transient_message_do_not_stop_retries() {
        let calls = AtomicU32::new(0);
        let classifier = SubstringClassifier::default();
        let result: Attempted<()> = with_retry(&policy(3), &classifier, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ExtractorError::Oracle("HTTP 500: internal error, request id 14031".to_string())) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(result.attempts, 4);
    }

    #[test]
    fn test_first_success_makes_one_attempt() {
        let classifier = SubstringClassifier::default();
        let result = tokio_test::block_on(with_retry(&policy(3), &classifier, |attempt| async move {
            Ok::<_, ExtractorError>(attempt)
        }));
        assert_eq!(result.attempts, 1);
        assert_eq!(result.outcome.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fatal_stops_early() {
        let classifier = SubstringClassifier::default();
        let result: Attempted<()> = with_retry(&policy(3), &classifier, |_| async {
            Err(ExtractorError::Oracle("API key not valid".to_string()))
        })
        .await;
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test]
    async fn test_payload_errors_retried() {
        let classifier = SubstringClassifier::default();
        let result = with_retry(&policy(3), &classifier, |attempt| async move {
            if attempt < 2 {
                Err(ExtractorError::Payload("truncated".to_string()))
            } else {
                Ok(attempt)
            }
        })
        .await;
        assert_eq!(result.outcome.unwrap(), 2);
        assert_eq!(result.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_between_attempts_only() {
        let p = RetryPolicy {
            base_delay: Duration::from_millis(100),
            ..policy(2)
        };
        let classifier = SubstringClassifier::default();
        let start = tokio::time::Instant::now();
        let result: Attempted<()> = with_retry(&p, &classifier, |_| async {
            Err(ExtractorError::Oracle("quota exceeded".to_string()))
        })
        .await;

        assert_eq!(result.attempts, 3);
        // (100 + 200) ms, doubled for rate limiting
        assert!(start.elapsed() >= Duration::from_millis(600));
        assert!(start.elapsed() < Duration::from_millis(700));
    }
}
