//! HTTP client retry utilities for calls to rate-limited upstream APIs.
//!
//! Provides configurable retry logic with exponential backoff for requests
//! sent through `reqwest`. Only transient failures are retried; any other
//! response is handed back to the caller untouched so it can interpret the
//! status code itself.

use reqwest::{Response, StatusCode, header::HeaderMap};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Configuration for retry behavior.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Initial backoff duration before first retry.
    pub initial_backoff: Duration,
    /// Maximum backoff duration. Also caps server-provided `Retry-After`.
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to backoff duration.
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with the specified max retries.
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Create a config with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Create a config for quick retries (smaller backoffs).
    pub fn quick() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            add_jitter: false,
        }
    }

    /// Calculate backoff duration for a given attempt.
    fn backoff_duration(&self, attempt: u32) -> Duration {
        let backoff =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let backoff_ms = backoff.min(self.max_backoff.as_millis() as f64) as u64;

        let mut duration = Duration::from_millis(backoff_ms);

        if self.add_jitter {
            // Up to 25% jitter
            let jitter = (backoff_ms as f64 * 0.25 * rand::random::<f64>()) as u64;
            duration += Duration::from_millis(jitter);
        }

        duration
    }

    /// Delay before the next attempt, preferring the server's `Retry-After`.
    fn delay_for(&self, attempt: u32, headers: Option<&HeaderMap>) -> Duration {
        match headers.and_then(retry_after) {
            Some(server_delay) => server_delay.min(self.max_backoff),
            None => self.backoff_duration(attempt),
        }
    }
}

/// Determines if an HTTP status is a transient upstream condition.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS       // Rate limited
        | StatusCode::INTERNAL_SERVER_ERROR // May be transient
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Determines if a transport error is worth another attempt.
pub fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

/// Parse a `Retry-After` header expressed in seconds.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Execute an HTTP call with retry logic.
///
/// Returns the first non-transient response, or the last response/error
/// once `max_retries` is exhausted. Returned errors carry no URL.
///
/// # Example
/// ```ignore
/// let response = retry_http_call(&RetryConfig::default(), "org_membership", || {
///     client.get(&url).send()
/// })
/// .await?;
/// ```
pub async fn retry_http_call<F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    f: F,
) -> Result<Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Response, reqwest::Error>>,
{
    let mut attempt = 0;

    loop {
        // The request URL may carry credentials in its query string.
        let outcome = f().await.map_err(reqwest::Error::without_url);

        let (transient, headers) = match &outcome {
            Ok(response) => (
                is_retryable_status(response.status()),
                Some(response.headers().clone()),
            ),
            Err(err) => (is_retryable_error(err), None),
        };

        if !transient {
            if attempt > 0 && outcome.is_ok() {
                info!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    "HTTP call succeeded after retry"
                );
            }
            return outcome;
        }

        if attempt >= config.max_retries {
            match &outcome {
                Ok(response) => warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    status = %response.status(),
                    "HTTP call still failing after max retries"
                ),
                Err(err) => warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    error = %err,
                    "HTTP call failed after max retries"
                ),
            }
            return outcome;
        }

        let backoff = config.delay_for(attempt, headers.as_ref());
        warn!(
            operation = operation_name,
            attempt = attempt + 1,
            backoff_ms = backoff.as_millis() as u64,
            "HTTP call hit a transient failure, retrying after backoff"
        );

        sleep(backoff).await;
        attempt += 1;
    }
}
