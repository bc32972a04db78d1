//! Interval polling feed.
//!
//! A tick that fires while the previous read is still outstanding is skipped,
//! so at most one read per feed is ever in flight.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, OptionFuture};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{deliver, FeedEvent, MIN_POLL_INTERVAL};
use crate::record::BusRecord;
use crate::store::{RecordStore, StoreError};

type PendingRead = BoxFuture<'static, Result<Option<BusRecord>, StoreError>>;

pub(super) async fn run<S: RecordStore>(
    store: Arc<S>,
    path: String,
    interval: Duration,
    tx: mpsc::Sender<FeedEvent>,
    cancel: CancellationToken,
) {
    if interval < MIN_POLL_INTERVAL {
        warn!(
            requested_ms = interval.as_millis() as u64,
            floor_ms = MIN_POLL_INTERVAL.as_millis() as u64,
            "Poll interval too short, using the floor"
        );
    }
    let interval = interval.max(MIN_POLL_INTERVAL);

    info!(
        path = %path,
        interval_ms = interval.as_millis() as u64,
        "Polling feed started"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut in_flight: Option<PendingRead> = None;
    let mut skipped_ticks: u64 = 0;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            Some(result) = OptionFuture::from(in_flight.as_mut()), if in_flight.is_some() => {
                in_flight = None;
                let event = match result {
                    Ok(record) => FeedEvent::Snapshot(record),
                    Err(e) => {
                        debug!(path = %path, error = %e, "Poll read failed");
                        FeedEvent::Error(e)
                    }
                };
                if !deliver(&tx, &cancel, event).await {
                    break;
                }
            }

            _ = ticker.tick() => {
                if in_flight.is_some() {
                    skipped_ticks += 1;
                    trace!(path = %path, skipped_ticks, "Read still in flight, skipping tick");
                    continue;
                }
                let store = Arc::clone(&store);
                let path = path.clone();
                in_flight = Some(Box::pin(async move { store.read(&path).await }));
            }
        }
    }

    info!(path = %path, skipped_ticks, "Polling feed stopped");
}
