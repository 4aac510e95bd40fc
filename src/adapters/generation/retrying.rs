//! Rate limiting and retry around any generation backend.

use async_trait::async_trait;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::warn;

use crate::domain::models::{RateLimitConfig, RetryConfig};
use crate::domain::ports::{GenerationError, GenerationOptions, GenerationService};

/// Token bucket shared by every request through one service instance.
pub fn build_rate_limiter(config: &RateLimitConfig) -> DefaultDirectRateLimiter {
    let rps = if config.requests_per_second > 0.0 {
        config.requests_per_second
    } else {
        1.0
    };
    let burst = NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN);
    let quota = Quota::with_period(Duration::from_secs_f64(1.0 / rps))
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(burst);
    RateLimiter::direct(quota)
}

fn build_backoff(config: &RetryConfig) -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(config.initial_backoff_ms))
        .with_max_interval(Duration::from_millis(config.max_backoff_ms))
        .with_multiplier(2.0)
        .with_max_elapsed_time(None)
        .build()
}

/// Waits for a rate-limit token before each attempt and retries rate-limited
/// and transient failures with exponential backoff, `max_retries` times.
pub struct RetryingGenerationService<S> {
    inner: S,
    limiter: DefaultDirectRateLimiter,
    retry: RetryConfig,
}

impl<S: GenerationService> RetryingGenerationService<S> {
    pub fn new(inner: S, rate_limit: &RateLimitConfig, retry: RetryConfig) -> Self {
        Self {
            inner,
            limiter: build_rate_limiter(rate_limit),
            retry,
        }
    }

    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: GenerationService> GenerationService for RetryingGenerationService<S> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        let attempts = AtomicU32::new(0);
        let max_attempts = self.retry.max_retries.saturating_add(1);
        let attempts_seen = &attempts;
        let this = self;

        backoff::future::retry_notify(
            build_backoff(&self.retry),
            move || async move {
                this.limiter.until_ready().await;
                let attempt = attempts_seen.fetch_add(1, Ordering::SeqCst) + 1;

                match this.inner.generate(prompt, options).await {
                    Ok(text) => Ok(text),
                    Err(err) if !err.is_retryable() => Err(backoff::Error::permanent(err)),
                    Err(err) if attempt >= max_attempts => {
                        Err(backoff::Error::permanent(GenerationError::Exhausted {
                            attempts: attempt,
                            last: err.to_string(),
                        }))
                    }
                    Err(GenerationError::RateLimited {
                        retry_after: Some(wait),
                    }) => Err(backoff::Error::retry_after(
                        GenerationError::RateLimited {
                            retry_after: Some(wait),
                        },
                        wait,
                    )),
                    Err(err) => Err(backoff::Error::transient(err)),
                }
            },
            |err: GenerationError, wait: Duration| {
                warn!(
                    label = %options.label,
                    attempt = attempts_seen.load(Ordering::SeqCst),
                    wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Generation attempt failed, retrying"
                );
            },
        )
        .await
    }
}
