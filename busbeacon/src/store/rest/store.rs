//! REST store backed by an HTTP document database.
//!
//! Paths map to `{base_url}/{path}.json`. Writes send a server-time
//! placeholder for `lastUpdatedAt` unless local timestamping is configured.
//! Subscriptions use the streaming endpoint of the same URL.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, info};

use super::probe::{check_connection, ConnectionCheck};
use super::sse::{MirrorUpdate, SseDecoder, StreamMirror};
use super::transport::{ByteStream, HttpResponse, HttpTransport};
use crate::record::{BusRecord, RecordPatch};
use crate::store::timestamp::{Stamper, TimestampMode};
use crate::store::traits::{RecordStore, RecordStream};
use crate::store::StoreError;

/// Store client for a REST document database.
pub struct RestStore<T: HttpTransport> {
    transport: Arc<T>,
    base_url: String,
    auth_token: Option<String>,
    stamper: Stamper,
}

impl<T: HttpTransport> RestStore<T> {
    /// Create a store client rooted at `base_url`.
    pub fn new(transport: T, base_url: impl Into<String>, stamper: Stamper) -> Self {
        Self {
            transport: Arc::new(transport),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token: None,
            stamper,
        }
    }

    /// Append `auth=<token>` to every request.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// The database root URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request URL for a logical path.
    pub fn url_for(&self, path: &str) -> String {
        let url = format!("{}/{}.json", self.base_url, path.trim_matches('/'));
        self.with_auth(url, None)
    }

    /// Probe the database root with a shallow read.
    pub async fn verify_connection(&self) -> ConnectionCheck {
        let url = self.with_auth(format!("{}/.json", self.base_url), Some("shallow=true"));
        check_connection(self.transport.as_ref(), &url).await
    }

    fn with_auth(&self, mut url: String, query: Option<&str>) -> String {
        let mut params: Vec<String> = Vec::new();
        if let Some(query) = query {
            params.push(query.to_string());
        }
        if let Some(token) = &self.auth_token {
            params.push(format!("auth={}", token));
        }
        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.join("&"));
        }
        url
    }
}

fn ensure_success(response: HttpResponse) -> Result<HttpResponse, StoreError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(response.into_error())
    }
}

impl<T: HttpTransport> RecordStore for RestStore<T> {
    async fn read(&self, path: &str) -> Result<Option<BusRecord>, StoreError> {
        let response = ensure_success(self.transport.get(&self.url_for(path)).await?)?;

        let text = String::from_utf8_lossy(&response.body);
        if text.trim().is_empty() {
            return Ok(None);
        }
        let document: Value = serde_json::from_str(&text)?;
        Ok(BusRecord::from_json(document)?)
    }

    async fn update(&self, path: &str, patch: &RecordPatch) -> Result<(), StoreError> {
        let fields = patch.to_fields(&self.stamper.stamp())?;
        let body = serde_json::to_string(&Value::Object(fields))?;

        debug!(path = path, "REST store update");
        ensure_success(self.transport.patch_json(&self.url_for(path), &body).await?)?;
        Ok(())
    }

    async fn replace(&self, path: &str, record: &BusRecord) -> Result<(), StoreError> {
        let document = record.to_document(self.stamper.stamp())?;
        let body = serde_json::to_string(&document)?;

        debug!(path = path, "REST store replace");
        ensure_success(self.transport.put_json(&self.url_for(path), &body).await?)?;
        Ok(())
    }

    async fn subscribe(&self, path: &str) -> Result<RecordStream, StoreError> {
        let bytes = self.transport.event_stream(&self.url_for(path)).await?;
        info!(path = path, "Realtime subscription opened");
        Ok(snapshot_stream(bytes))
    }

    fn timestamp_mode(&self) -> TimestampMode {
        self.stamper.mode()
    }
}

struct Subscription {
    bytes: ByteStream,
    decoder: SseDecoder,
    mirror: StreamMirror,
    pending: VecDeque<Result<Option<BusRecord>, StoreError>>,
    finished: bool,
}

/// Turn a raw event stream into full-record snapshots.
///
/// The stream ends after delivering a terminal error (server cancel, broken
/// connection, or end of body).
fn snapshot_stream(bytes: ByteStream) -> RecordStream {
    let state = Subscription {
        bytes,
        decoder: SseDecoder::new(),
        mirror: StreamMirror::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    let stream = futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    for event in state.decoder.feed(&chunk) {
                        match state.mirror.apply(&event) {
                            MirrorUpdate::Snapshot(record) => state.pending.push_back(Ok(record)),
                            MirrorUpdate::Ignored => {}
                            MirrorUpdate::Failed(e) => state.pending.push_back(Err(e)),
                            MirrorUpdate::Closed(e) => {
                                state.pending.push_back(Err(e));
                                state.finished = true;
                                break;
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    state.pending.push_back(Err(e));
                    state.finished = true;
                }
                None => {
                    state.pending.push_back(Err(StoreError::SubscriptionClosed(
                        "event stream ended".to_string(),
                    )));
                    state.finished = true;
                }
            }
        }
    });

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::super::transport::tests::MockTransport;
    use super::*;
    use crate::record::Location;
    use crate::time::ManualClock;
    use serde_json::json;

    const BASE: &str = "https://bus-demo.example.com/";

    fn server_store(transport: MockTransport) -> RestStore<MockTransport> {
        RestStore::new(
            transport,
            BASE,
            Stamper::new(TimestampMode::Server, Arc::new(ManualClock::new(0))),
        )
    }

    #[test]
    fn test_url_for_path() {
        let store = server_store(MockTransport::responding(200, "null"));
        assert_eq!(
            store.url_for("/busData/live"),
            "https://bus-demo.example.com/busData/live.json"
        );

        let store = store.with_auth_token("tok");
        assert_eq!(
            store.url_for("busData/live"),
            "https://bus-demo.example.com/busData/live.json?auth=tok"
        );
    }

    #[tokio::test]
    async fn test_read_null_is_none() {
        let store = server_store(MockTransport::responding(200, "null"));
        assert_eq!(store.read("busData/live").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_decodes_record() {
        let store = server_store(MockTransport::responding(
            200,
            r#"{"isSharing":true,"lastUpdatedAt":12,"location":{"latitude":1.5,"longitude":2.5,"timestamp":10}}"#,
        ));

        let record = store.read("busData/live").await.unwrap().unwrap();
        assert!(record.is_sharing);
        assert_eq!(record.location.unwrap().longitude, 2.5);
    }

    #[tokio::test]
    async fn test_read_http_error() {
        let store = server_store(MockTransport::responding(401, r#"{"error":"Permission denied"}"#));

        let error = store.read("busData/live").await.unwrap_err();
        assert!(error.is_permission_denied());
    }

    #[tokio::test]
    async fn test_update_sends_server_placeholder() {
        let transport = MockTransport::responding(200, "{}");
        let store = server_store(transport.clone());

        store
            .update(
                "busData/live",
                &RecordPatch::new()
                    .sharing(true)
                    .location(Location::new(1.0, 2.0, 3)),
            )
            .await
            .unwrap();

        let requests = transport.recorded();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "PATCH");

        let body: Value = serde_json::from_str(requests[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["isSharing"], json!(true));
        assert_eq!(body["lastUpdatedAt"], json!({".sv": "timestamp"}));
        assert_eq!(body["location"]["timestamp"], json!(3));
    }

    #[tokio::test]
    async fn test_replace_with_local_stamp() {
        let transport = MockTransport::responding(200, "{}");
        let store = RestStore::new(
            transport.clone(),
            BASE,
            Stamper::new(TimestampMode::Local, Arc::new(ManualClock::new(99))),
        );

        store.replace("busData/live", &BusRecord::baseline()).await.unwrap();

        let requests = transport.recorded();
        assert_eq!(requests[0].method, "PUT");
        let body: Value = serde_json::from_str(requests[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["lastUpdatedAt"], json!(99));
        assert_eq!(body["isSharing"], json!(false));
        assert_eq!(store.timestamp_mode(), TimestampMode::Local);
    }

    #[tokio::test]
    async fn test_subscribe_yields_snapshots_then_closes() {
        let transport = MockTransport::responding(200, "").with_events(&[
            "event: put\ndata: {\"path\":\"/\",\"data\":{\"isSharing\":false}}\n\n",
            "event: keep-alive\ndata: null\n\nevent: patch\ndata: {\"path\":\"/\",",
            "\"data\":{\"isSharing\":true}}\n\n",
        ]);
        let store = server_store(transport);

        let mut stream = store.subscribe("busData/live").await.unwrap();

        let first = stream.next().await.unwrap().unwrap().unwrap();
        assert!(!first.is_sharing);
        let second = stream.next().await.unwrap().unwrap().unwrap();
        assert!(second.is_sharing);

        let end = stream.next().await.unwrap();
        assert!(matches!(end, Err(StoreError::SubscriptionClosed(_))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_verify_connection_uses_shallow_root() {
        let transport = MockTransport::responding(200, "{}");
        let store = server_store(transport.clone()).with_auth_token("tok");

        assert_eq!(store.verify_connection().await, ConnectionCheck::Reachable);
        assert_eq!(
            transport.recorded()[0].url,
            "https://bus-demo.example.com/.json?shallow=true&auth=tok"
        );
    }
}
