//! In-process store backend.
//!
//! Holds one JSON document per path and fans out snapshots to subscribers
//! through `tokio::sync::watch`. Used for tests, demos and single-host
//! deployments where producer and consumers share a process.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

use super::error::StoreError;
use super::timestamp::TimestampMode;
use super::traits::{RecordStore, RecordStream};
use crate::record::{apply_fields, BusRecord, RecordPatch};
use crate::time::{system_clock, Clock};

/// Kind of write recorded in the history log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Update,
    Replace,
}

/// One applied write and the document it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteEntry {
    pub path: String,
    pub kind: WriteKind,
    pub snapshot: Option<BusRecord>,
}

struct Inner {
    documents: HashMap<String, Value>,
    channels: HashMap<String, watch::Sender<Result<Value, StoreError>>>,
    last_stamp: i64,
    offline: Option<String>,
    history: Vec<WriteEntry>,
}

/// Store backend kept entirely in memory.
pub struct MemoryStore {
    mode: TimestampMode,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Server-timestamped store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(TimestampMode::Server, system_clock())
    }

    /// Store with an explicit timestamp mode and clock.
    ///
    /// In server mode stamps never decrease even if `clock` goes backwards.
    /// In local mode the raw clock value is written.
    pub fn with_clock(mode: TimestampMode, clock: Arc<dyn Clock>) -> Self {
        Self {
            mode,
            clock,
            inner: Mutex::new(Inner {
                documents: HashMap::new(),
                channels: HashMap::new(),
                last_stamp: i64::MIN,
                offline: None,
                history: Vec::new(),
            }),
        }
    }

    /// Make every subsequent operation fail with `Unavailable(reason)`.
    pub fn set_offline(&self, reason: impl Into<String>) {
        self.inner.lock().offline = Some(reason.into());
    }

    /// Undo [`set_offline`](Self::set_offline).
    pub fn set_online(&self) {
        self.inner.lock().offline = None;
    }

    /// Deliver `error` to current subscribers of `path`.
    ///
    /// The next successful write delivers a snapshot again.
    pub fn inject_subscription_error(&self, path: &str, error: StoreError) {
        let mut inner = self.inner.lock();
        let sender = channel_for(&mut inner, &normalize(path));
        let _previous = sender.send_replace(Err(error));
    }

    /// Current document at `path`, decoded.
    pub fn document(&self, path: &str) -> Option<BusRecord> {
        let inner = self.inner.lock();
        inner
            .documents
            .get(&normalize(path))
            .and_then(|doc| BusRecord::from_json(doc.clone()).ok().flatten())
    }

    /// Every write applied so far, oldest first.
    pub fn history(&self) -> Vec<WriteEntry> {
        self.inner.lock().history.clone()
    }

    /// Forget the write history.
    pub fn clear_history(&self) {
        self.inner.lock().history.clear();
    }

    fn next_stamp(&self, inner: &mut Inner) -> i64 {
        let now = self.clock.now_millis();
        let stamp = match self.mode {
            TimestampMode::Server => now.max(inner.last_stamp),
            TimestampMode::Local => now,
        };
        inner.last_stamp = inner.last_stamp.max(stamp);
        stamp
    }

    fn commit(&self, inner: &mut Inner, path: String, kind: WriteKind, document: Value) {
        let snapshot = BusRecord::from_json(document.clone()).ok().flatten();
        let _previous = channel_for(inner, &path).send_replace(Ok(document.clone()));
        inner.documents.insert(path.clone(), document);
        inner.history.push(WriteEntry {
            path,
            kind,
            snapshot,
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryStore {
    async fn read(&self, path: &str) -> Result<Option<BusRecord>, StoreError> {
        let inner = self.inner.lock();
        if let Some(reason) = &inner.offline {
            return Err(StoreError::Unavailable(reason.clone()));
        }
        match inner.documents.get(&normalize(path)) {
            Some(document) => Ok(BusRecord::from_json(document.clone())?),
            None => Ok(None),
        }
    }

    async fn update(&self, path: &str, patch: &RecordPatch) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if let Some(reason) = &inner.offline {
            return Err(StoreError::Unavailable(reason.clone()));
        }

        let path = normalize(path);
        let stamp = self.next_stamp(&mut inner);
        let fields = patch.to_fields(&Value::from(stamp))?;

        let mut document = inner.documents.get(&path).cloned().unwrap_or(Value::Null);
        apply_fields(&mut document, &fields);

        debug!(path = %path, stamp = stamp, fields = fields.len(), "Memory store update");
        self.commit(&mut inner, path, WriteKind::Update, document);
        Ok(())
    }

    async fn replace(&self, path: &str, record: &BusRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if let Some(reason) = &inner.offline {
            return Err(StoreError::Unavailable(reason.clone()));
        }

        let path = normalize(path);
        let stamp = self.next_stamp(&mut inner);
        let document = record.to_document(Value::from(stamp))?;

        debug!(path = %path, stamp = stamp, "Memory store replace");
        self.commit(&mut inner, path, WriteKind::Replace, document);
        Ok(())
    }

    async fn subscribe(&self, path: &str) -> Result<RecordStream, StoreError> {
        let mut receiver = {
            let mut inner = self.inner.lock();
            if let Some(reason) = &inner.offline {
                return Err(StoreError::Unavailable(reason.clone()));
            }
            channel_for(&mut inner, &normalize(path)).subscribe()
        };
        receiver.mark_changed();

        let stream = futures::stream::unfold(receiver, |mut receiver| async move {
            receiver.changed().await.ok()?;
            let item = match &*receiver.borrow_and_update() {
                Ok(document) => BusRecord::from_json(document.clone()).map_err(StoreError::from),
                Err(e) => Err(e.clone()),
            };
            Some((item, receiver))
        });

        Ok(Box::pin(stream))
    }

    fn timestamp_mode(&self) -> TimestampMode {
        self.mode
    }
}

fn channel_for<'a>(
    inner: &'a mut Inner,
    path: &str,
) -> &'a watch::Sender<Result<Value, StoreError>> {
    inner
        .channels
        .entry(path.to_string())
        .or_insert_with(|| watch::channel(Ok(Value::Null)).0)
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DriverError, Location};
    use crate::time::ManualClock;
    use futures::StreamExt;

    const PATH: &str = "busData/live";

    fn store_at(millis: i64, mode: TimestampMode) -> (MemoryStore, ManualClock) {
        let clock = ManualClock::new(millis);
        (MemoryStore::with_clock(mode, Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn test_read_missing_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.read(PATH).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_merges_and_stamps() {
        let (store, _clock) = store_at(1_000, TimestampMode::Server);

        store
            .update(PATH, &RecordPatch::new().location(Location::new(1.0, 2.0, 900)))
            .await
            .unwrap();
        store
            .update(PATH, &RecordPatch::new().sharing(true))
            .await
            .unwrap();

        let record = store.read(PATH).await.unwrap().unwrap();
        assert!(record.is_sharing);
        assert_eq!(record.location.unwrap().latitude, 1.0);
        assert_eq!(record.last_updated_at, Some(1_000));
    }

    #[tokio::test]
    async fn test_replace_overwrites() {
        let (store, _clock) = store_at(10, TimestampMode::Server);
        store
            .update(
                PATH,
                &RecordPatch::new().sharing(true).driver_error(Some(DriverError {
                    code: 1,
                    message: "denied".to_string(),
                })),
            )
            .await
            .unwrap();

        store.replace(PATH, &BusRecord::baseline()).await.unwrap();

        let record = store.read(PATH).await.unwrap().unwrap();
        assert!(!record.is_sharing);
        assert!(record.driver_reported_error.is_none());
        assert_eq!(record.last_updated_at, Some(10));
    }

    #[tokio::test]
    async fn test_server_stamps_never_decrease() {
        let (store, clock) = store_at(5_000, TimestampMode::Server);
        store.update(PATH, &RecordPatch::new()).await.unwrap();

        clock.set(4_000);
        store.update(PATH, &RecordPatch::new()).await.unwrap();

        let record = store.read(PATH).await.unwrap().unwrap();
        assert_eq!(record.last_updated_at, Some(5_000));
    }

    #[tokio::test]
    async fn test_local_stamps_follow_clock() {
        let (store, clock) = store_at(5_000, TimestampMode::Local);
        store.update(PATH, &RecordPatch::new()).await.unwrap();

        clock.set(4_000);
        store.update(PATH, &RecordPatch::new()).await.unwrap();

        let record = store.read(PATH).await.unwrap().unwrap();
        assert_eq!(record.last_updated_at, Some(4_000));
    }

    #[tokio::test]
    async fn test_offline_fails_all_operations() {
        let store = MemoryStore::new();
        store.set_offline("no network");

        assert!(matches!(store.read(PATH).await, Err(StoreError::Unavailable(_))));
        assert!(store.update(PATH, &RecordPatch::new()).await.is_err());
        assert!(store.replace(PATH, &BusRecord::baseline()).await.is_err());
        assert!(store.subscribe(PATH).await.is_err());

        store.set_online();
        assert!(store.read(PATH).await.is_ok());
    }

    #[tokio::test]
    async fn test_subscribe_delivers_current_then_changes() {
        let store = MemoryStore::new();
        store.replace(PATH, &BusRecord::baseline()).await.unwrap();

        let mut stream = store.subscribe(PATH).await.unwrap();
        let first = stream.next().await.unwrap().unwrap().unwrap();
        assert!(!first.is_sharing);

        store
            .update(PATH, &RecordPatch::new().sharing(true))
            .await
            .unwrap();
        let second = stream.next().await.unwrap().unwrap().unwrap();
        assert!(second.is_sharing);
    }

    #[tokio::test]
    async fn test_injected_subscription_error() {
        let store = MemoryStore::new();
        let mut stream = store.subscribe(PATH).await.unwrap();
        assert_eq!(stream.next().await.unwrap(), Ok(None));

        store.inject_subscription_error(PATH, StoreError::Transport("reset".to_string()));
        assert!(stream.next().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_history_records_writes() {
        let store = MemoryStore::new();
        store.replace("/busData/live/", &BusRecord::baseline()).await.unwrap();
        store
            .update(PATH, &RecordPatch::new().sharing(true))
            .await
            .unwrap();

        let history = store.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, WriteKind::Replace);
        assert_eq!(history[0].path, PATH);
        assert!(history[1].snapshot.as_ref().unwrap().is_sharing);
    }
}
