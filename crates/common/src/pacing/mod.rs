//! Provider pacing
//!
//! Two pieces shared by every outbound caller:
//! - [`RateLimiterRegistry`]: one governor token bucket per provider, shared
//!   by all in-flight resolutions.
//! - [`RetryPolicy`]: attempt-bounded retry with exponential backoff for
//!   transient failures.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::config::RetryConfig;

/// Shared provider rate limiter
pub type ProviderLimiter = DefaultDirectRateLimiter;

/// Rate limiter for `per_minute` requests, bursting one request at a time.
pub fn per_minute_limiter(per_minute: u32) -> Arc<ProviderLimiter> {
    let rate = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_minute(rate)))
}

/// Rate limiter for `per_second` requests.
pub fn per_second_limiter(per_second: u32) -> Arc<ProviderLimiter> {
    let rate = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_second(rate)))
}

/// Named limiters, one per provider. Clones share the same buckets.
#[derive(Clone, Default)]
pub struct RateLimiterRegistry {
    limiters: Arc<RwLock<HashMap<String, Arc<ProviderLimiter>>>>,
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, limiter: Arc<ProviderLimiter>) {
        if let Ok(mut map) = self.limiters.write() {
            map.insert(name.to_string(), limiter);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<ProviderLimiter>> {
        self.limiters.read().ok()?.get(name).cloned()
    }

    /// Wait for a permit from `name`'s bucket. Unregistered names are unpaced.
    pub async fn until_ready(&self, name: &str) {
        if let Some(limiter) = self.get(name) {
            limiter.until_ready().await;
        }
    }
}

/// Attempt-bounded retry with exponential backoff.
///
/// Operations report failures as [`backoff::Error`]: `Permanent` stops
/// immediately, `Transient` is retried until `max_attempts` calls were made.
/// A `retry_after` hint from the server takes precedence over the computed delay.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }

    /// No waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, backoff::Error<E>>>,
        E: std::fmt::Display,
    {
        let mut delays = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_backoff)
            .with_max_interval(self.max_backoff)
            .with_max_elapsed_time(None)
            .build();

        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(backoff::Error::Permanent(err)) => return Err(err),
                Err(backoff::Error::Transient { err, retry_after }) => {
                    if attempt >= self.max_attempts {
                        tracing::warn!(
                            target_name = label,
                            attempts = attempt,
                            error = %err,
                            "Giving up after transient failures"
                        );
                        return Err(err);
                    }
                    let delay = retry_after
                        .or_else(|| delays.next_backoff())
                        .unwrap_or(self.max_backoff);
                    tracing::debug!(
                        target_name = label,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient failure, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_transient_failures_are_bounded() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);

        let result: Result<(), String> = policy
            .run("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(backoff::Error::transient("429".to_string())) }
            })
            .await;

        assert_eq!(result.unwrap_err(), "429");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_stops_immediately() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(5);

        let result: Result<(), String> = policy
            .run("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(backoff::Error::permanent("bad request".to_string())) }
            })
            .await;

        tokio_test::assert_err!(result);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_retry() {
        let policy = RetryPolicy::immediate(3);
        let result: Result<u32, String> = policy
            .run("test", |attempt| async move {
                if attempt < 2 {
                    Err(backoff::Error::transient("timeout".to_string()))
                } else {
                    Ok(attempt)
                }
            })
            .await;
        assert_eq!(result, Ok(2));
    }

    #[tokio::test]
    async fn test_registry_shares_buckets() {
        let registry = RateLimiterRegistry::new();
        registry.register("arxiv", per_second_limiter(1));
        let clone = registry.clone();

        assert!(registry.get("arxiv").unwrap().check().is_ok());
        // The single permit was spent through the other handle.
        assert!(clone.get("arxiv").unwrap().check().is_err());
        assert!(registry.get("unknown").is_none());
        registry.until_ready("unknown").await;
    }
}
