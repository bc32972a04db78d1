//! Record feeds: a uniform event channel over push or poll delivery.
//!
//! ```text
//! open_feed(store, path, mode)
//!   ├── FeedMode::Push        → subscribe(), resubscribe with backoff
//!   └── FeedMode::Poll { .. } → read() on an interval, one read in flight
//!                                    │
//!                                    ▼
//!                        mpsc::Receiver<FeedEvent>
//! ```
//!
//! Dropping or closing the [`FeedHandle`] cancels the background task. No
//! event is delivered after [`FeedHandle::close`] returns.

mod poll;
mod push;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::error::StoreError;
use super::traits::RecordStore;
use crate::record::BusRecord;

/// Default refresh interval for polling feeds.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Shortest interval a polling feed ticks at. Shorter requests are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

const FEED_CHANNEL_CAPACITY: usize = 16;

/// How a feed learns about record changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedMode {
    /// Store push subscription.
    #[default]
    Push,
    /// Periodic fresh reads.
    Poll { interval: Duration },
}

impl FeedMode {
    /// Polling at `interval`.
    pub fn poll(interval: Duration) -> Self {
        FeedMode::Poll { interval }
    }
}

impl fmt::Display for FeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedMode::Push => write!(f, "push"),
            FeedMode::Poll { interval } => write!(f, "poll every {}ms", interval.as_millis()),
        }
    }
}

/// One delivery from a feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Full record state (`None` when no document exists).
    Snapshot(Option<BusRecord>),
    /// Read or subscription failure. Later events may still arrive.
    Error(StoreError),
}

/// Receiving end of a running feed.
pub struct FeedHandle {
    events: mpsc::Receiver<FeedEvent>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl FeedHandle {
    /// Next event, or `None` once the feed has stopped.
    pub async fn next(&mut self) -> Option<FeedEvent> {
        self.events.recv().await
    }

    /// Stop the feed and wait for its task to exit.
    pub async fn close(mut self) {
        self.cancel.cancel();
        self.events.close();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Feed task ended abnormally");
            }
        }
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Start a feed of `path` on `store`.
pub fn open_feed<S: RecordStore>(
    store: Arc<S>,
    path: impl Into<String>,
    mode: FeedMode,
) -> FeedHandle {
    let path = path.into();
    let (tx, rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();

    let task = match mode {
        FeedMode::Push => tokio::spawn(push::run(store, path, tx, cancel.clone())),
        FeedMode::Poll { interval } => {
            tokio::spawn(poll::run(store, path, interval, tx, cancel.clone()))
        }
    };

    FeedHandle {
        events: rx,
        cancel,
        task: Some(task),
    }
}

/// Send `event`, giving up if the feed is cancelled or the receiver is gone.
///
/// Returns false when the feed should stop.
async fn deliver(
    tx: &mpsc::Sender<FeedEvent>,
    cancel: &CancellationToken,
    event: FeedEvent,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(event) => sent.is_ok(),
    }
}
