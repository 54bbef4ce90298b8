//! Outbound HTTP for integrations, behind a trait so the fetcher can be
//! exercised without a network.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: reqwest::Method,
    /// Fully assembled URL including query string
    pub url: url::Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn is_retryable(&self) -> bool {
        self.status == 429 || (500..600).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl TransportError {
    fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Timeout(_) | TransportError::Connect(_))
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("mssp-api/", env!("CARGO_PKG_VERSION")))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(e.to_string())
            } else if e.is_connect() {
                TransportError::Connect(e.to_string())
            } else {
                TransportError::Request(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self { max_retries: 0, backoff: Duration::ZERO }
    }

    fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

/// Sends `request`, retrying connect errors, timeouts, 429 and 5xx with
/// exponential backoff. The last response is returned even when it failed.
pub async fn send_with_retry(
    transport: &dyn HttpTransport,
    request: &HttpRequest,
    policy: RetryPolicy,
) -> Result<HttpResponse, TransportError> {
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            let delay = policy.delay(attempt);
            debug!("Retry attempt {} for {} after {:?}", attempt, request.url.host_str().unwrap_or("-"), delay);
            sleep(delay).await;
        }

        let last = attempt >= policy.max_retries;
        match transport.send(request).await {
            Ok(response) if response.is_retryable() && !last => {
                warn!("Upstream returned {}, retrying", response.status);
            }
            Err(e) if e.is_retryable() && !last => {
                warn!("Upstream request failed ({}), retrying", e);
            }
            result => return result,
        }
        attempt += 1;
    }
}

#[cfg(test)]
pub mod mock {
    //! Scripted transport for tests

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MockTransport {
        responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl MockTransport {
        pub fn new(responses: Vec<Result<HttpResponse, TransportError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn ok(status: u16, body: &str) -> Result<HttpResponse, TransportError> {
            Ok(HttpResponse { status, body: body.to_string() })
        }

        pub fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Request("no scripted response".to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;

    fn request() -> HttpRequest {
        HttpRequest {
            method: reqwest::Method::GET,
            url: url::Url::parse("https://jira.example.com/rest/api/2/search").unwrap(),
            headers: vec![],
            body: None,
            timeout: Duration::from_secs(5),
        }
    }

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy { max_retries, backoff: Duration::from_millis(1) }
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let transport = MockTransport::new(vec![
            MockTransport::ok(503, "busy"),
            Err(TransportError::Timeout("slow".to_string())),
            MockTransport::ok(200, "{}"),
        ]);
        let response = send_with_retry(&transport, &request(), fast(3)).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let transport = MockTransport::new(vec![
            MockTransport::ok(500, "a"),
            MockTransport::ok(500, "b"),
            MockTransport::ok(500, "c"),
        ]);
        let response = send_with_retry(&transport, &request(), fast(1)).await.unwrap();
        assert_eq!(response.status, 500);
        assert_eq!(response.body, "b");
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let transport = MockTransport::new(vec![MockTransport::ok(404, "missing"), MockTransport::ok(200, "{}")]);
        let response = send_with_retry(&transport, &request(), fast(3)).await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy { max_retries: 10, backoff: Duration::from_millis(200) };
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(800));
        assert_eq!(policy.delay(20), MAX_BACKOFF);
    }
}
