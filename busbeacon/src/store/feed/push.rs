//! Push subscription feed.
//!
//! When the subscription fails or ends, the error is delivered and the feed
//! resubscribes with exponential backoff. This is transport reconnection, the
//! part a realtime client library normally does underneath a listener; it
//! never retries writes or role entry, which stay with the caller.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{deliver, FeedEvent};
use crate::store::RecordStore;

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub(super) async fn run<S: RecordStore>(
    store: Arc<S>,
    path: String,
    tx: mpsc::Sender<FeedEvent>,
    cancel: CancellationToken,
) {
    info!(path = %path, "Push feed started");

    let mut consecutive_errors: u32 = 0;

    'feed: loop {
        let subscription = tokio::select! {
            biased;
            _ = cancel.cancelled() => break 'feed,
            subscription = store.subscribe(&path) => subscription,
        };

        match subscription {
            Ok(mut stream) => loop {
                let item = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break 'feed,
                    item = stream.next() => item,
                };
                let event = match item {
                    Some(Ok(record)) => {
                        consecutive_errors = 0;
                        FeedEvent::Snapshot(record)
                    }
                    Some(Err(e)) => {
                        warn!(path = %path, error = %e, "Subscription error");
                        FeedEvent::Error(e)
                    }
                    None => {
                        debug!(path = %path, "Subscription stream ended");
                        break;
                    }
                };
                if !deliver(&tx, &cancel, event).await {
                    break 'feed;
                }
            },
            Err(e) => {
                warn!(path = %path, error = %e, "Failed to subscribe");
                if !deliver(&tx, &cancel, FeedEvent::Error(e)).await {
                    break 'feed;
                }
            }
        }

        consecutive_errors += 1;
        let backoff = calculate_backoff(consecutive_errors);
        debug!(
            backoff_ms = backoff.as_millis() as u64,
            consecutive_errors, "Resubscribing after backoff"
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break 'feed,
            _ = tokio::time::sleep(backoff) => {}
        }
    }

    info!(path = %path, "Push feed stopped");
}

/// Exponential backoff from `INITIAL_BACKOFF`, capped at `MAX_BACKOFF`.
fn calculate_backoff(consecutive_errors: u32) -> Duration {
    let factor = 2u32.saturating_pow(consecutive_errors.saturating_sub(1).min(16));
    INITIAL_BACKOFF.saturating_mul(factor).min(MAX_BACKOFF)
}
