//! HTTP client retry utilities for service-to-service communication.
//!
//! Only failures where the request provably did not take effect downstream are
//! retried: connection errors and 429/502/503 responses. Timeouts are not
//! retried because the peer may already have applied the change.

use reqwest::StatusCode;
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
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

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
}

/// Response statuses that mean the peer did not process the request.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE
    )
}

/// Transport errors that happened before the request reached the peer.
pub fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_connect()
}

/// Execute an HTTP call with retry logic.
///
/// The final response is returned as-is whatever its status; callers decide
/// what a non-success status means for them.
///
/// ```ignore
/// let response = retry_http_call(&RetryConfig::default(), "record_sale", || {
///     client.traced_patch(&url).json(&payload).send()
/// })
/// .await?;
/// ```
pub async fn retry_http_call<F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    f: F,
) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 0;

    loop {
        let outcome = f().await;

        let retryable = match &outcome {
            Ok(response) => is_retryable_status(response.status()),
            Err(err) => is_retryable_error(err),
        };

        if !retryable {
            if attempt > 0 && outcome.as_ref().is_ok_and(|r| r.status().is_success()) {
                info!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    "HTTP call succeeded after retry"
                );
            }
            return outcome;
        }

        if attempt >= config.max_retries {
            warn!(
                operation = operation_name,
                attempt = attempt + 1,
                "HTTP call failed after max retries"
            );
            return outcome;
        }

        let backoff = config.backoff_duration(attempt);
        match &outcome {
            Ok(response) => warn!(
                operation = operation_name,
                attempt = attempt + 1,
                status = response.status().as_u16(),
                backoff_ms = backoff.as_millis(),
                "HTTP call failed, retrying after backoff"
            ),
            Err(err) => warn!(
                operation = operation_name,
                attempt = attempt + 1,
                error = %err,
                backoff_ms = backoff.as_millis(),
                "HTTP call failed, retrying after backoff"
            ),
        }

        sleep(backoff).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            add_jitter: false,
        }
    }

    #[test]
    fn test_backoff_duration() {
        let config = RetryConfig {
            add_jitter: false,
            ..Default::default()
        };

        assert_eq!(config.backoff_duration(0), Duration::from_millis(100));
        assert_eq!(config.backoff_duration(1), Duration::from_millis(200));
        assert_eq!(config.backoff_duration(2), Duration::from_millis(400));
    }

    #[test]
    fn test_is_retryable_status() {
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_retryable_status(StatusCode::GATEWAY_TIMEOUT));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn test_retries_unavailable_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/item/record-sale"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/item/record-sale"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/item/record-sale", server.uri());
        let response = retry_http_call(&fast_config(2), "record_sale", || {
            client.patch(&url).send()
        })
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_internal_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/item/record-purchase", server.uri());
        let response = retry_http_call(&fast_config(3), "record_purchase", || {
            client.patch(&url).send()
        })
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/item/record-sale", server.uri());
        let response = retry_http_call(&fast_config(2), "record_sale", || {
            client.patch(&url).send()
        })
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }
}
