//! HTTP transport abstraction for the REST backend.
//!
//! The transport only moves bytes. Status interpretation lives in the store so
//! the connection probe can inspect error bodies that a plain read would turn
//! into a failure.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, trace, warn};

use crate::store::StoreError;

/// Chunked body of a streaming response.
pub type ByteStream = BoxStream<'static, Result<Bytes, StoreError>>;

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Build a response from a status and body.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The message from an `{"error": "..."}` body, or the raw body text.
    pub fn error_message(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
            if let Some(message) = value.get("error").and_then(|e| e.as_str()) {
                return message.to_string();
            }
        }
        let trimmed = text.trim();
        if trimmed.is_empty() {
            format!("status {}", self.status)
        } else {
            trimmed.to_string()
        }
    }

    /// Convert a non-2xx response into a store error.
    pub fn into_error(self) -> StoreError {
        StoreError::Http {
            status: self.status,
            message: self.error_message(),
        }
    }
}

/// Trait for the HTTP operations the REST store needs.
///
/// This abstraction allows mock transports in tests.
pub trait HttpTransport: Send + Sync + 'static {
    /// GET `url`.
    fn get(&self, url: &str) -> impl Future<Output = Result<HttpResponse, StoreError>> + Send;

    /// PATCH `url` with a JSON body.
    fn patch_json(
        &self,
        url: &str,
        body: &str,
    ) -> impl Future<Output = Result<HttpResponse, StoreError>> + Send;

    /// PUT `url` with a JSON body.
    fn put_json(
        &self,
        url: &str,
        body: &str,
    ) -> impl Future<Output = Result<HttpResponse, StoreError>> + Send;

    /// Open a `text/event-stream` GET on `url`.
    ///
    /// Non-2xx statuses fail with [`StoreError::Http`].
    fn event_stream(&self, url: &str) -> impl Future<Output = Result<ByteStream, StoreError>> + Send;
}

/// Transport backed by an async `reqwest::Client`.
///
/// Plain requests carry a per-request timeout. Event streams only bound the
/// connect phase since they stay open indefinitely.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Create a transport with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .user_agent(concat!("busbeacon/", env!("CARGO_PKG_VERSION")))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    async fn send(
        &self,
        method: &'static str,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<HttpResponse, StoreError> {
        trace!(method, url = redact(url), "HTTP request starting");

        let response = request.timeout(self.timeout).send().await.map_err(|e| {
            warn!(
                method,
                url = redact(url),
                error = %e,
                is_connect = e.is_connect(),
                is_timeout = e.is_timeout(),
                "HTTP request failed"
            );
            StoreError::Transport(format!("{} request failed: {}", method, e))
        })?;

        let status = response.status().as_u16();
        debug!(method, url = redact(url), status, "HTTP response received");

        let body = response
            .bytes()
            .await
            .map_err(|e| StoreError::Transport(format!("Failed to read response: {}", e)))?;

        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, StoreError> {
        self.send("GET", self.client.get(url), url).await
    }

    async fn patch_json(&self, url: &str, body: &str) -> Result<HttpResponse, StoreError> {
        let request = self
            .client
            .patch(url)
            .header("Content-Type", "application/json")
            .body(body.to_string());
        self.send("PATCH", request, url).await
    }

    async fn put_json(&self, url: &str, body: &str) -> Result<HttpResponse, StoreError> {
        let request = self
            .client
            .put(url)
            .header("Content-Type", "application/json")
            .body(body.to_string());
        self.send("PUT", request, url).await
    }

    async fn event_stream(&self, url: &str) -> Result<ByteStream, StoreError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| StoreError::Transport(format!("Event stream request failed: {}", e)))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
            return Err(HttpResponse::new(status, body).into_error());
        }

        debug!(url = redact(url), "Event stream opened");

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| StoreError::Transport(e.to_string())));
        Ok(Box::pin(stream))
    }
}

/// Strip the query string so auth tokens never reach the log.
fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// One request captured by [`MockTransport`].
    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedRequest {
        pub method: &'static str,
        pub url: String,
        pub body: Option<String>,
    }

    /// Mock transport returning a fixed response and event chunks.
    #[derive(Clone)]
    pub struct MockTransport {
        pub response: Result<HttpResponse, StoreError>,
        pub events: Vec<Result<Bytes, StoreError>>,
        pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
    }

    impl MockTransport {
        pub fn responding(status: u16, body: &str) -> Self {
            Self {
                response: Ok(HttpResponse::new(status, body.as_bytes().to_vec())),
                events: Vec::new(),
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn failing(error: StoreError) -> Self {
            Self {
                response: Err(error),
                events: Vec::new(),
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn with_events(mut self, chunks: &[&str]) -> Self {
            self.events = chunks
                .iter()
                .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
                .collect();
            self
        }

        pub fn recorded(&self) -> Vec<RecordedRequest> {
            self.requests.lock().clone()
        }

        fn record(&self, method: &'static str, url: &str, body: Option<&str>) {
            self.requests.lock().push(RecordedRequest {
                method,
                url: url.to_string(),
                body: body.map(str::to_string),
            });
        }
    }

    impl HttpTransport for MockTransport {
        async fn get(&self, url: &str) -> Result<HttpResponse, StoreError> {
            self.record("GET", url, None);
            self.response.clone()
        }

        async fn patch_json(&self, url: &str, body: &str) -> Result<HttpResponse, StoreError> {
            self.record("PATCH", url, Some(body));
            self.response.clone()
        }

        async fn put_json(&self, url: &str, body: &str) -> Result<HttpResponse, StoreError> {
            self.record("PUT", url, Some(body));
            self.response.clone()
        }

        async fn event_stream(&self, url: &str) -> Result<ByteStream, StoreError> {
            self.record("STREAM", url, None);
            if let Err(e) = &self.response {
                return Err(e.clone());
            }
            Ok(Box::pin(futures::stream::iter(self.events.clone())))
        }
    }

    #[test]
    fn test_error_message_from_json_body() {
        let response = HttpResponse::new(401, r#"{"error" : "Permission denied"}"#);
        assert_eq!(response.error_message(), "Permission denied");
        assert!(!response.is_success());
    }

    #[test]
    fn test_error_message_from_plain_body() {
        assert_eq!(HttpResponse::new(502, " Bad Gateway\n").error_message(), "Bad Gateway");
        assert_eq!(HttpResponse::new(500, "").error_message(), "status 500");
    }

    #[test]
    fn test_redact_strips_query() {
        assert_eq!(
            redact("https://db.example.com/busData/live.json?auth=secret"),
            "https://db.example.com/busData/live.json"
        );
    }

    #[test]
    fn test_reqwest_transport_creation() {
        assert!(ReqwestTransport::new(Duration::from_secs(5)).is_ok());
    }
}
