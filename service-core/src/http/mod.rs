//! Outbound HTTP utilities shared by services that call third-party APIs.

pub mod retry;

pub use retry::{RetryConfig, is_retryable_error, is_retryable_status, retry_http_call};
