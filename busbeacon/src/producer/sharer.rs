//! Location sharing state machine.
//!
//! ```text
//!          start()             first valid sample
//!   Idle ──────────► Acquiring ─────────────────► Sharing
//!    ▲                   │                           │
//!    └───────────────────┴──────── stop() ───────────┘
//! ```
//!
//! Acquisition errors never change the state; they are stored and written to
//! `driverReportedError` while the watch continues.
//!
//! Each `start()` bumps a generation counter and the pump tags every reading
//! with the generation it was started under. `stop()` bumps it again under
//! the same lock that enqueues its final write, so a reading that races with
//! `stop()` is dropped and can never land after the stop write.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::geolocation::GeolocationError;
use super::source::{PositionProvider, PositionReading, PositionWatch};
use super::state::{ProducerStatus, SharingState, StatusCell};
use super::writer::{spawn_writer, WriteAck, WriteRequest};
use crate::record::RecordPatch;
use crate::store::{RecordStore, StoreError};
use crate::time::Clock;

struct SharerCore {
    cell: Arc<StatusCell>,
    writer: mpsc::UnboundedSender<WriteRequest>,
    clock: Arc<dyn Clock>,
}

impl SharerCore {
    fn enqueue(&self, patch: RecordPatch, ack: Option<oneshot::Sender<Result<(), StoreError>>>) {
        if self.writer.send(WriteRequest::Patch { patch, ack }).is_err() {
            warn!("Producer writer is gone, update dropped");
        }
    }

    /// Enter `Acquiring` under a new generation.
    fn begin(&self) -> u64 {
        self.cell.update(|inner| {
            inner.generation += 1;
            inner.status.state = SharingState::Acquiring;
            inner.status.geolocation_error = None;
            self.enqueue(RecordPatch::new().sharing(true).driver_error(None), None);
            inner.generation
        })
    }

    /// Enter `Idle` and invalidate the running generation.
    fn halt(&self) -> WriteAck {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.cell.update(|inner| {
            inner.generation += 1;
            inner.status.state = SharingState::Idle;
            inner.status.geolocation_error = None;
            self.enqueue(
                RecordPatch::new().sharing(false).driver_error(None),
                Some(ack_tx),
            );
        });
        ack_rx
    }

    fn accept(&self, generation: u64, reading: PositionReading) {
        self.cell.update(|inner| {
            if inner.generation != generation {
                trace!(generation, current = inner.generation, "Dropping late reading");
                return;
            }

            match reading {
                Ok(location) if !location.is_valid() => {
                    debug!(
                        latitude = location.latitude,
                        longitude = location.longitude,
                        "Discarding out-of-range sample"
                    );
                }
                Ok(location) => {
                    if inner.status.state != SharingState::Sharing {
                        info!(
                            lat = %format!("{:.5}", location.latitude),
                            lon = %format!("{:.5}", location.longitude),
                            "First position sample accepted"
                        );
                    }
                    inner.status.state = SharingState::Sharing;
                    inner.status.geolocation_error = None;
                    inner.status.location = Some(location.clone());
                    inner.status.samples_accepted += 1;
                    self.enqueue(
                        RecordPatch::new()
                            .location(location)
                            .sharing(true)
                            .driver_error(None),
                        None,
                    );
                }
                Err(error) => {
                    warn!(code = error.code.code(), message = %error.message, "Geolocation error");
                    self.enqueue(
                        RecordPatch::new().driver_error(Some(error.to_driver_error())),
                        None,
                    );
                    inner.status.geolocation_error = Some(error);
                }
            }
        });
    }

    fn report_incident(&self, reported: bool) {
        let now = self.clock.now_millis();
        self.cell.update(|inner| {
            let status = &mut inner.status;
            status.additional_status.incident_reported = Some(reported);
            status.additional_status.last_status_update = Some(now);

            let mut patch = RecordPatch::new().incident_reported(reported);
            // A normal-status report also clears a standing acquisition error
            if !reported {
                status.geolocation_error = None;
                patch = patch.driver_error(None);
            }
            self.enqueue(patch, None);
        });
    }

    fn report_seat_availability(&self, available: bool) {
        let now = self.clock.now_millis();
        self.cell.update(|inner| {
            inner.status.additional_status.seats_available = Some(available);
            inner.status.additional_status.last_status_update = Some(now);
            self.enqueue(RecordPatch::new().seats_available(available), None);
        });
    }

    fn barrier(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.writer.send(WriteRequest::Barrier(tx));
        rx
    }
}

struct Pump {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Producer that shares the device position through the store.
pub struct LocationSharer<P: PositionProvider> {
    provider: P,
    core: Arc<SharerCore>,
    pump: Mutex<Option<Pump>>,
}

impl<P: PositionProvider> LocationSharer<P> {
    /// Create an idle sharer writing to `path`. Nothing is written until a
    /// lifecycle or report call.
    pub fn new<S: RecordStore>(
        store: Arc<S>,
        path: impl Into<String>,
        provider: P,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cell = Arc::new(StatusCell::new());
        let (writer, _task) = spawn_writer(store, path.into(), Arc::clone(&cell));

        Self {
            provider,
            core: Arc::new(SharerCore {
                cell,
                writer,
                clock,
            }),
            pump: Mutex::new(None),
        }
    }

    /// Start watching position.
    ///
    /// Writes `isSharing: true` right away. If a watch is already running this
    /// is a no-op. A provider that cannot start at all leaves the sharer in
    /// `Acquiring` with the error stored and written, and returns it.
    pub fn start(&self) -> Result<(), GeolocationError> {
        let mut pump = self.pump.lock();
        if pump.as_ref().is_some_and(|p| !p.task.is_finished()) {
            debug!("Position watch already running");
            return Ok(());
        }

        let generation = self.core.begin();
        info!(provider = self.provider.name(), generation, "Location sharing started");

        match self.provider.watch() {
            Ok(watch) => {
                let cancel = CancellationToken::new();
                let task = tokio::spawn(run_pump(
                    Arc::clone(&self.core),
                    generation,
                    watch,
                    cancel.clone(),
                ));
                *pump = Some(Pump { cancel, task });
                Ok(())
            }
            Err(error) => {
                self.core.accept(generation, Err(error.clone()));
                Err(error)
            }
        }
    }

    /// Stop watching and write `isSharing: false`.
    ///
    /// The write is issued even when already idle. No reading is processed
    /// after this returns. Returns the outcome of the stop write.
    pub async fn stop(&self) -> Result<(), StoreError> {
        let (pump, ack) = {
            let mut guard = self.pump.lock();
            (guard.take(), self.core.halt())
        };

        if let Some(pump) = pump {
            pump.cancel.cancel();
            if let Err(e) = pump.task.await {
                warn!(error = %e, "Position pump ended abnormally");
            }
        }
        info!("Location sharing stopped");

        ack.await.unwrap_or_else(|_| {
            Err(StoreError::Unavailable("producer writer stopped".to_string()))
        })
    }

    /// Report an incident (accident, traffic jam) or its absence.
    ///
    /// Reporting `false` also clears a standing acquisition error.
    pub fn report_incident(&self, reported: bool) {
        self.core.report_incident(reported);
    }

    /// Report whether seats are available.
    pub fn report_seat_availability(&self, available: bool) {
        self.core.report_seat_availability(available);
    }

    /// Wait until every write issued so far has completed.
    pub async fn sync_writes(&self) {
        let _ = self.core.barrier().await;
    }

    pub fn status(&self) -> ProducerStatus {
        self.core.cell.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProducerStatus> {
        self.core.cell.subscribe()
    }

    pub fn state(&self) -> SharingState {
        self.status().state
    }

    /// True while acquiring or sharing.
    pub fn is_sharing(&self) -> bool {
        self.status().is_active()
    }
}

impl<P: PositionProvider> Drop for LocationSharer<P> {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.lock().take() {
            pump.cancel.cancel();
        }
    }
}

async fn run_pump(
    core: Arc<SharerCore>,
    generation: u64,
    mut watch: PositionWatch,
    cancel: CancellationToken,
) {
    loop {
        let reading = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            reading = watch.next() => reading,
        };
        match reading {
            Some(reading) => core.accept(generation, reading),
            None => {
                debug!(generation, "Position watch ended");
                break;
            }
        }
    }
    watch.cancel();
}
