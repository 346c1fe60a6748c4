//! Bounded, retried GET requests to the identity provider.

use reqwest::{Client, Response, Url};
use service_core::http::{retry_http_call, RetryConfig};
use std::time::Duration;

use crate::config::ProbeConfig;
use crate::services::error::AuthzError;

#[derive(Debug, Clone)]
pub struct Upstream {
    retry: RetryConfig,
    timeout: Duration,
}

impl Upstream {
    pub fn new(probe: &ProbeConfig) -> Self {
        Self {
            retry: RetryConfig::with_max_retries(probe.max_retries),
            timeout: probe.timeout,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Upper bound for one call including every retry; each attempt is
    /// also bounded by the client.
    fn budget(&self) -> Duration {
        self.timeout
            .saturating_mul(self.retry.max_retries.saturating_add(1))
    }

    /// Send a GET, retrying transient failures. Any status is returned to
    /// the caller; only transport failures and timeouts become errors.
    pub async fn get(
        &self,
        client: &Client,
        url: &Url,
        operation: &str,
    ) -> Result<Response, AuthzError> {
        let budget = self.budget();
        let call = retry_http_call(&self.retry, operation, || client.get(url.clone()).send());

        match tokio::time::timeout(budget, call).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) if e.is_timeout() => Err(AuthzError::Timeout {
                url: redact(url),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
            Ok(Err(e)) => Err(AuthzError::Transport {
                url: redact(url),
                source: e.without_url(),
            }),
            Err(_) => Err(AuthzError::Timeout {
                url: redact(url),
                timeout_ms: budget.as_millis() as u64,
            }),
        }
    }
}

/// URL without its query string, safe to log.
pub fn redact(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}
