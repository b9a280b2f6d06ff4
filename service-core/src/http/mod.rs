//! Helpers for outbound HTTP calls between services.
pub mod retry;

pub use retry::{RetryConfig, is_retryable_error, is_retryable_status, retry_http_call};
