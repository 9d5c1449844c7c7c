use std::time::Duration;

use bon::Builder;

use crate::{
    api::price_source::{FetchError, PriceSource},
    core::series::PriceSeries,
    prelude::*,
};

/// Bounded exponential backoff for one refresh cycle.
#[must_use]
#[derive(Copy, Clone, Debug, Builder)]
pub struct Backoff {
    #[builder(default = 3)]
    pub max_attempts: u32,

    #[builder(default = Duration::from_secs(1))]
    pub initial_delay: Duration,

    #[builder(default = 2)]
    pub multiplier: u32,

    #[builder(default = Duration::from_secs(30))]
    pub max_delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Backoff {
    /// Delay before the retry that follows the specified failed attempt (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Fetch from the source, retrying the retryable failures.
    ///
    /// Returns the last error once the attempts are exhausted.
    #[instrument(skip_all, fields(max_attempts = self.max_attempts))]
    pub async fn retry(&self, source: &dyn PriceSource) -> Result<PriceSeries, FetchError> {
        let mut attempt = 1;
        loop {
            match source.fetch().await {
                Ok(series) => return Ok(series),
                Err(error) if !error.is_retryable() => {
                    warn!(attempt, "giving up on a non-retryable error: {error}");
                    return Err(error);
                }
                Err(error) if attempt >= self.max_attempts => {
                    warn!(attempt, "giving up after all attempts: {error}");
                    return Err(error);
                }
                Err(error) => {
                    let delay = self.delay_after(attempt);
                    warn!(attempt, ?delay, "attempt failed, retrying: {error}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
