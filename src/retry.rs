use std::future::Future;
use std::time::Duration;

use crate::config::RetrySettings;
use crate::error::{ServiceError, ServiceResult};

/// Bounded retry with a fixed delay.
///
/// Stateless: build one per call from [`RetrySettings`]. An operation runs at
/// most `max_retries + 1` times; excluded errors propagate on first sight.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self::new(settings.max_retries, settings.delay)
    }

    /// Run `operation`, retrying everything except business errors.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> ServiceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        self.execute_unless(operation, ServiceError::is_business_error)
            .await
    }

    /// Run `operation`, retrying every error for which `excluded` is false.
    pub async fn execute_unless<T, F, Fut, P>(
        &self,
        mut operation: F,
        excluded: P,
    ) -> ServiceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
        P: Fn(&ServiceError) -> bool,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if excluded(&err) => return Err(err),
                Err(err) if attempt >= self.max_retries => {
                    tracing::debug!("Giving up after {} attempts: {err}", attempt + 1);
                    return Err(err);
                }
                Err(err) => {
                    attempt += 1;
                    tracing::warn!(
                        "Attempt {attempt}/{} failed, retrying in {:?}: {err}",
                        self.max_retries + 1,
                        self.delay
                    );
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}
