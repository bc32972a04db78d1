//! Producer status model.

use std::fmt;

use parking_lot::Mutex;
use tokio::sync::watch;

use super::geolocation::GeolocationError;
use crate::record::{AdditionalStatus, Location};
use crate::store::StoreError;

/// Producer lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SharingState {
    /// Not watching position.
    #[default]
    Idle,
    /// Watch requested, no sample accepted yet.
    Acquiring,
    /// At least one sample accepted since the last start.
    Sharing,
}

impl fmt::Display for SharingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SharingState::Idle => write!(f, "Idle"),
            SharingState::Acquiring => write!(f, "Acquiring"),
            SharingState::Sharing => write!(f, "Sharing"),
        }
    }
}

/// Snapshot of the producer as the operator sees it.
///
/// Reflects attempted state: a failed write does not roll anything back, it
/// only sets `store_error`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProducerStatus {
    pub state: SharingState,

    /// Last accepted sample, kept after stop.
    pub location: Option<Location>,

    /// Acquisition error channel.
    pub geolocation_error: Option<GeolocationError>,

    /// Store/connectivity error channel. Cleared by the next successful write.
    pub store_error: Option<StoreError>,

    /// Trip status as last reported from this producer.
    pub additional_status: AdditionalStatus,

    pub samples_accepted: u64,
    pub writes_failed: u64,
}

impl ProducerStatus {
    /// True while watching (acquiring or sharing).
    pub fn is_active(&self) -> bool {
        self.state != SharingState::Idle
    }
}

pub(super) struct Inner {
    pub status: ProducerStatus,
    pub generation: u64,
}

/// Status shared between the sharer, its pump and its writer task.
pub(super) struct StatusCell {
    inner: Mutex<Inner>,
    tx: watch::Sender<ProducerStatus>,
}

impl StatusCell {
    pub(super) fn new() -> Self {
        let (tx, _) = watch::channel(ProducerStatus::default());
        Self {
            inner: Mutex::new(Inner {
                status: ProducerStatus::default(),
                generation: 0,
            }),
            tx,
        }
    }

    /// Run `f` under the lock and publish the resulting status.
    pub(super) fn update<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.inner.lock();
        let result = f(&mut inner);
        self.tx.send_replace(inner.status.clone());
        result
    }

    pub(super) fn snapshot(&self) -> ProducerStatus {
        self.inner.lock().status.clone()
    }

    pub(super) fn subscribe(&self) -> watch::Receiver<ProducerStatus> {
        self.tx.subscribe()
    }

    pub(super) fn record_write(&self, result: &Result<(), StoreError>) {
        self.update(|inner| match result {
            Ok(()) => inner.status.store_error = None,
            Err(e) => {
                inner.status.store_error = Some(e.clone());
                inner.status.writes_failed += 1;
            }
        });
    }
}
