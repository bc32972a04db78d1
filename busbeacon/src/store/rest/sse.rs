//! Server-sent event framing and realtime document mirroring.
//!
//! The store's streaming endpoint emits `put` and `patch` events carrying a
//! `{"path": ..., "data": ...}` payload relative to the subscribed location.
//! [`StreamMirror`] replays them onto a local copy so every event yields a
//! full record snapshot.

use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

use crate::record::{merge_at_path, set_at_path, BusRecord};
use crate::store::StoreError;

/// One dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` decoder.
///
/// Chunks may split lines or events anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every event completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }
        events
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.event.is_none() && self.data.is_empty() {
            return None;
        }
        let event = self.event.take().unwrap_or_else(|| "message".to_string());
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent { event, data })
    }
}

/// Outcome of applying one event to the mirror.
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorUpdate {
    /// The document changed; here is the new full record.
    Snapshot(Option<BusRecord>),
    /// Nothing to deliver (keep-alive, unknown events).
    Ignored,
    /// The event or the resulting document could not be decoded.
    Failed(StoreError),
    /// The server ended the subscription.
    Closed(StoreError),
}

#[derive(Deserialize)]
struct Payload {
    path: String,
    #[serde(default)]
    data: Value,
}

/// Local copy of the subscribed document.
#[derive(Debug, Default)]
pub struct StreamMirror {
    document: Value,
}

impl StreamMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event to the local copy.
    pub fn apply(&mut self, event: &SseEvent) -> MirrorUpdate {
        trace!(event = %event.event, bytes = event.data.len(), "Realtime event");

        match event.event.as_str() {
            "put" | "patch" => {}
            "keep-alive" => return MirrorUpdate::Ignored,
            "cancel" => {
                let reason = if event.data.trim().is_empty() || event.data.trim() == "null" {
                    "cancelled by server".to_string()
                } else {
                    event.data.trim().trim_matches('"').to_string()
                };
                return MirrorUpdate::Closed(StoreError::SubscriptionClosed(reason));
            }
            "auth_revoked" => {
                return MirrorUpdate::Closed(StoreError::SubscriptionClosed(
                    "credential expired".to_string(),
                ))
            }
            _ => return MirrorUpdate::Ignored,
        }

        let payload: Payload = match serde_json::from_str(&event.data) {
            Ok(payload) => payload,
            Err(e) => return MirrorUpdate::Failed(StoreError::Decode(e.to_string())),
        };

        if event.event == "put" {
            set_at_path(&mut self.document, &payload.path, payload.data);
        } else if let Value::Object(children) = &payload.data {
            merge_at_path(&mut self.document, &payload.path, children);
        } else {
            return MirrorUpdate::Failed(StoreError::Decode(
                "patch event without an object payload".to_string(),
            ));
        }

        match BusRecord::from_json(self.document.clone()) {
            Ok(record) => MirrorUpdate::Snapshot(record),
            Err(e) => MirrorUpdate::Failed(StoreError::from(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_handles_split_chunks() {
        let mut decoder = SseDecoder::new();

        assert!(decoder.feed(b"event: put\nda").is_empty());
        let events = decoder.feed(b"ta: {\"path\":\"/\",\"data\":null}\n\n");

        assert_eq!(
            events,
            vec![SseEvent {
                event: "put".to_string(),
                data: r#"{"path":"/","data":null}"#.to_string(),
            }]
        );
    }

    #[test]
    fn test_decoder_ignores_comments_and_crlf() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b": hello\r\nevent: keep-alive\r\ndata: null\r\n\r\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "keep-alive");
        assert_eq!(events[0].data, "null");
    }

    #[test]
    fn test_decoder_joins_multiline_data() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: a\ndata: b\n\n");

        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "a\nb");
    }

    fn event(name: &str, data: &str) -> SseEvent {
        SseEvent {
            event: name.to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_mirror_put_then_patch() {
        let mut mirror = StreamMirror::new();

        let first = mirror.apply(&event(
            "put",
            r#"{"path":"/","data":{"isSharing":false,"lastUpdatedAt":1}}"#,
        ));
        let MirrorUpdate::Snapshot(Some(record)) = first.clone() else {
            panic!("expected snapshot, got {:?}", first);
        };
        assert!(!record.is_sharing);

        let second = mirror.apply(&event(
            "patch",
            r#"{"path":"/","data":{"isSharing":true,"lastUpdatedAt":2}}"#,
        ));
        let MirrorUpdate::Snapshot(Some(record)) = second.clone() else {
            panic!("expected snapshot, got {:?}", second);
        };
        assert!(record.is_sharing);
        assert_eq!(record.last_updated_at, Some(2));
    }

    #[test]
    fn test_mirror_nested_put() {
        let mut mirror = StreamMirror::new();
        mirror.apply(&event("put", r#"{"path":"/","data":{"isSharing":true}}"#));

        let update = mirror.apply(&event(
            "put",
            r#"{"path":"/additionalStatus/incidentReported","data":true}"#,
        ));

        let MirrorUpdate::Snapshot(Some(record)) = update else {
            panic!("expected snapshot");
        };
        assert!(record.is_sharing);
        assert_eq!(record.additional_status.incident_reported, Some(true));
    }

    #[test]
    fn test_mirror_null_document() {
        let mut mirror = StreamMirror::new();
        assert_eq!(
            mirror.apply(&event("put", r#"{"path":"/","data":null}"#)),
            MirrorUpdate::Snapshot(None)
        );
    }

    #[test]
    fn test_mirror_control_events() {
        let mut mirror = StreamMirror::new();

        assert_eq!(mirror.apply(&event("keep-alive", "null")), MirrorUpdate::Ignored);
        assert!(matches!(
            mirror.apply(&event("cancel", "\"Permission denied\"")),
            MirrorUpdate::Closed(StoreError::SubscriptionClosed(m)) if m == "Permission denied"
        ));
        assert!(matches!(
            mirror.apply(&event("auth_revoked", "null")),
            MirrorUpdate::Closed(_)
        ));
        assert!(matches!(
            mirror.apply(&event("put", "not json")),
            MirrorUpdate::Failed(StoreError::Decode(_))
        ));
    }
}
