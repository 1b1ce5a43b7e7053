// Retry logic with exponential backoff
//
// Transport errors, 429 and 5xx responses are retried. Other API errors
// (bad key, bad request) fail immediately.

use anyhow::Result;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

const MAX_RETRIES: u32 = 3;
const BASE_DELAY_MS: u64 = 1000;

/// Non-success HTTP status returned by a model API
#[derive(Debug, Clone, Error)]
#[error("API request failed\n\nStatus: {status}\nBody: {body}")]
pub struct ApiError {
    pub status: u16,
    pub body: String,
}

impl ApiError {
    pub fn is_retryable(&self) -> bool {
        self.status == 429 || self.status >= 500
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no backoff
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }
}

fn is_retryable(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<ApiError>() {
        Some(api) => api.is_retryable(),
        None => true,
    }
}

/// Execute a function with exponential backoff retry logic
pub async fn with_retry<F, Fut, T>(policy: RetryPolicy, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                if attempt >= attempts || !is_retryable(&e) {
                    return Err(e);
                }

                let delay = policy.base_delay * 2u32.pow(attempt - 1);
                tracing::warn!(
                    "Request failed (attempt {}/{}), retrying in {:?}: {}",
                    attempt,
                    attempts,
                    delay,
                    e
                );
                sleep(delay).await;
            }
        }
    }
}
