//! Single FIFO writer for producer updates.
//!
//! Every producer write goes through one task so the store sees them in the
//! order the state machine issued them.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::state::StatusCell;
use crate::record::RecordPatch;
use crate::store::{RecordStore, StoreError};

pub(super) type WriteAck = oneshot::Receiver<Result<(), StoreError>>;

pub(super) enum WriteRequest {
    Patch {
        patch: RecordPatch,
        ack: Option<oneshot::Sender<Result<(), StoreError>>>,
    },
    Barrier(oneshot::Sender<()>),
}

pub(super) fn spawn_writer<S: RecordStore>(
    store: Arc<S>,
    path: String,
    cell: Arc<StatusCell>,
) -> (mpsc::UnboundedSender<WriteRequest>, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(store, path, cell, rx));
    (tx, task)
}

async fn run<S: RecordStore>(
    store: Arc<S>,
    path: String,
    cell: Arc<StatusCell>,
    mut rx: mpsc::UnboundedReceiver<WriteRequest>,
) {
    let mut writes: u64 = 0;

    while let Some(request) = rx.recv().await {
        match request {
            WriteRequest::Patch { patch, ack } => {
                writes += 1;
                let result = store.update(&path, &patch).await;
                if let Err(e) = &result {
                    warn!(path = %path, error = %e, "Producer write failed");
                }
                cell.record_write(&result);
                if let Some(ack) = ack {
                    let _ = ack.send(result);
                }
            }
            WriteRequest::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }

    debug!(path = %path, writes, "Producer writer stopped");
}
