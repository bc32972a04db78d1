//! Consumer-side record synchronization.
//!
//! Folds feed events into a local snapshot. A failed read or a broken
//! subscription never blanks the record: the last good copy stays and the
//! failure is reported alongside it.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::display::ConsumerView;
use crate::record::BusRecord;
use crate::store::{open_feed, FeedEvent, FeedHandle, FeedMode, RecordStore, StoreError};

/// The observer's current picture of the shared record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumerSnapshot {
    /// Last successfully received record (`None` when absent or not yet known).
    pub record: Option<BusRecord>,

    /// Set when the last delivery failed; cleared by the next success.
    pub connection_error: Option<StoreError>,

    /// True once any successful delivery arrived.
    pub received_any: bool,

    /// Number of successful deliveries.
    pub updates: u64,
}

impl ConsumerSnapshot {
    /// Fold one feed event into the snapshot.
    pub fn apply(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Snapshot(record) => {
                self.record = record;
                self.connection_error = None;
                self.received_any = true;
                self.updates += 1;
            }
            FeedEvent::Error(error) => {
                self.connection_error = Some(error);
            }
        }
    }
}

/// Running consumer for one record path.
pub struct ConsumerSync {
    snapshot: watch::Receiver<ConsumerSnapshot>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    mode: FeedMode,
}

impl ConsumerSync {
    /// Start following `path` on `store`.
    pub fn start<S: RecordStore>(store: Arc<S>, path: impl Into<String>, mode: FeedMode) -> Self {
        let path = path.into();
        info!(path = %path, mode = %mode, "Consumer sync started");

        let feed = open_feed(store, path, mode);
        let (tx, rx) = watch::channel(ConsumerSnapshot::default());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(feed, tx, cancel.clone()));

        Self {
            snapshot: rx,
            cancel,
            task: Some(task),
            mode,
        }
    }

    pub fn mode(&self) -> FeedMode {
        self.mode
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> ConsumerSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<ConsumerSnapshot> {
        self.snapshot.clone()
    }

    /// Display facts derived from the current snapshot.
    pub fn view(&self, now_millis: i64) -> ConsumerView {
        ConsumerView::new(&self.snapshot.borrow(), now_millis)
    }

    /// Stop following. The snapshot no longer changes once this returns.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Consumer task ended abnormally");
            }
        }
        debug!("Consumer sync closed");
    }
}

impl Drop for ConsumerSync {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    mut feed: FeedHandle,
    tx: watch::Sender<ConsumerSnapshot>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = feed.next() => event,
        };
        let Some(event) = event else {
            break;
        };

        if let FeedEvent::Error(e) = &event {
            warn!(error = %e, "Consumer lost contact with store, keeping last record");
        }
        tx.send_modify(|snapshot| snapshot.apply(event));
    }

    feed.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Location, RecordPatch};
    use crate::store::MemoryStore;
    use std::time::Duration;

    const PATH: &str = "busData/live";

    fn sharing_record() -> BusRecord {
        BusRecord {
            is_sharing: true,
            location: Some(Location::new(1.0, 2.0, 0)),
            ..BusRecord::default()
        }
    }

    #[test]
    fn test_error_keeps_record() {
        let mut snapshot = ConsumerSnapshot::default();
        snapshot.apply(FeedEvent::Snapshot(Some(sharing_record())));
        snapshot.apply(FeedEvent::Error(StoreError::Transport("reset".to_string())));

        assert_eq!(snapshot.record, Some(sharing_record()));
        assert!(snapshot.connection_error.is_some());

        snapshot.apply(FeedEvent::Snapshot(None));
        assert!(snapshot.record.is_none());
        assert!(snapshot.connection_error.is_none());
        assert_eq!(snapshot.updates, 2);
    }

    #[tokio::test]
    async fn test_sync_follows_store() {
        let store = Arc::new(MemoryStore::new());
        let sync = ConsumerSync::start(store.clone(), PATH, FeedMode::Push);
        let mut rx = sync.subscribe();

        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| s.received_any))
            .await
            .unwrap()
            .unwrap();
        assert!(sync.snapshot().record.is_none());

        store
            .update(PATH, &RecordPatch::new().sharing(true))
            .await
            .unwrap();
        tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|s| s.record.as_ref().is_some_and(|r| r.is_sharing)),
        )
        .await
        .unwrap()
        .unwrap();

        sync.close().await;
    }

    #[tokio::test]
    async fn test_no_updates_after_close() {
        let store = Arc::new(MemoryStore::new());
        let sync = ConsumerSync::start(store.clone(), PATH, FeedMode::Push);
        let mut rx = sync.subscribe();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| s.received_any))
            .await
            .unwrap()
            .unwrap();
        let before = rx.borrow().updates;

        sync.close().await;
        store
            .update(PATH, &RecordPatch::new().sharing(true))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(rx.borrow().updates, before);
    }
}
