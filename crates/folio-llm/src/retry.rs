//! Retry of transient HTTP failures for the hosted backends.
//!
//! Only "slow down" statuses are retried: 429 and the overload family (503, 529).
//! Everything else is handed back to the caller on the first attempt.

use std::future::Future;
use std::time::Duration;

use reqwest::{Response, StatusCode};

use crate::error::LlmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

fn is_transient(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 503 | 529)
}

impl RetryPolicy {
    /// Doubling delay for the given zero-based attempt, clamped to `max_delay`.
    pub(crate) fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// A server-supplied `Retry-After` (whole seconds) wins over the computed backoff,
    /// still clamped to `max_delay`.
    fn delay_for(&self, response: &Response, attempt: u32) -> Duration {
        response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or_else(
                || self.backoff(attempt),
                |secs| Duration::from_secs(secs).min(self.max_delay),
            )
    }

    /// Run `send` until it yields a non-transient response or retries run out.
    ///
    /// # Errors
    ///
    /// `LlmError::Http` on transport failure, `LlmError::RateLimited` when every attempt
    /// came back with a transient status.
    pub(crate) async fn run<F, Fut>(&self, provider: &str, mut send: F) -> Result<Response, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Response, reqwest::Error>>,
    {
        let mut attempt = 0;
        loop {
            let response = send().await?;
            let status = response.status();
            if !is_transient(status) {
                return Ok(response);
            }
            if attempt >= self.max_retries {
                tracing::warn!(provider, %status, attempts = attempt + 1, "giving up after transient errors");
                return Err(LlmError::RateLimited);
            }
            let delay = self.delay_for(&response, attempt);
            tracing::warn!(
                provider,
                %status,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "transient error, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn quick(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn backoff_doubles_then_clamps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
        assert_eq!(policy.backoff(10), Duration::from_secs(60));
        assert_eq!(policy.backoff(40), Duration::from_secs(60));
    }

    #[test]
    fn transient_statuses() {
        assert!(is_transient(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient(StatusCode::from_u16(529).unwrap()));
        assert!(!is_transient(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_transient(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn non_transient_status_returned_immediately() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = server.uri();
        let response = quick(3).run("test", || client.get(&url).send()).await.unwrap();
        assert_eq!(response.status().as_u16(), 500);
    }

    #[tokio::test]
    async fn persistent_overload_becomes_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).insert_header("retry-after", "0"))
            .expect(3)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = server.uri();
        let result = quick(2).run("test", || client.get(&url).send()).await;
        assert!(matches!(result, Err(LlmError::RateLimited)));
    }
}
