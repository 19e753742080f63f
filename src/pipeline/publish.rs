//! Rate-limited publisher.
//!
//! Wraps a [`PostClient`] with two independent disciplines:
//!
//! - **Spacing**: consecutive attempts are at least `min_delay_between_posts`
//!   apart. Every attempt counts, including retries of the same post.
//! - **Retry**: a failed attempt is retried after a fixed `retry_delay`, up
//!   to `max_retries` times, only when `auto_retry` is on.

use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};

use crate::error::AppError;
use crate::models::{RetryConfig, ThrottlingConfig};
use crate::services::{PostClient, PostRef};

/// A post that was accepted.
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    pub post: PostRef,
    /// Attempts used, including the successful one
    pub attempts: u32,
}

/// A post that could not be published within the retry budget.
#[derive(Debug, Error)]
#[error("publish failed after {attempts} attempt(s): {source}")]
pub struct PublishError {
    pub attempts: u32,
    #[source]
    pub source: AppError,
}

/// Publisher enforcing spacing and bounded fixed-delay retry.
pub struct RateLimitedPublisher {
    client: Box<dyn PostClient>,
    min_interval: Option<Duration>,
    retry: RetryConfig,
    last_attempt: Option<Instant>,
}

impl RateLimitedPublisher {
    pub fn new(
        client: Box<dyn PostClient>,
        throttling: &ThrottlingConfig,
        retry: RetryConfig,
    ) -> Self {
        Self {
            client,
            min_interval: throttling.min_interval(),
            retry,
            last_attempt: None,
        }
    }

    /// Time left before the next attempt may start.
    fn spacing_delay(&self) -> Option<Duration> {
        let interval = self.min_interval?;
        let elapsed = self.last_attempt?.elapsed();
        (elapsed < interval).then(|| interval - elapsed)
    }

    /// Publish `text`, retrying on failure as configured.
    pub async fn publish(&mut self, text: &str) -> Result<PublishReceipt, PublishError> {
        let max_attempts = self.retry.max_attempts();
        let mut attempts = 0;

        loop {
            if let Some(wait) = self.spacing_delay() {
                log::debug!("Rate limiting: sleeping for {:.2} seconds", wait.as_secs_f64());
                sleep(wait).await;
            }

            attempts += 1;
            self.last_attempt = Some(Instant::now());

            let error = match self.client.push(text).await {
                Ok(post) => return Ok(PublishReceipt { post, attempts }),
                Err(e) => e,
            };

            log::error!("Failed to post (attempt {attempts}/{max_attempts}): {error}");

            if attempts >= max_attempts {
                return Err(PublishError {
                    attempts,
                    source: error,
                });
            }

            log::info!("Retrying in {} seconds...", self.retry.retry_delay);
            sleep(self.retry.delay()).await;
        }
    }
}
