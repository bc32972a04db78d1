//! Host-fed provider.
//!
//! The embedding application pushes readings as they arrive from whatever
//! positioning API it has. Readings pushed while no watch is active are
//! dropped.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use super::geolocation::GeolocationError;
use super::source::{PositionProvider, PositionReading, PositionWatch};

#[derive(Default)]
struct Inner {
    active: Option<mpsc::Sender<PositionReading>>,
    watch_error: Option<GeolocationError>,
    watches_opened: u64,
}

/// Provider fed by the host application. Clones share the same channel.
#[derive(Clone, Default)]
pub struct ChannelProvider {
    inner: Arc<Mutex<Inner>>,
}

impl ChannelProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a reading to the active watch.
    ///
    /// Returns false if there is no active watch or its buffer is full.
    pub fn push(&self, reading: PositionReading) -> bool {
        let inner = self.inner.lock();
        let Some(active) = inner.active.as_ref() else {
            trace!("No active watch, reading dropped");
            return false;
        };
        active.try_send(reading).is_ok()
    }

    /// Make future `watch()` calls fail with `error` (e.g. no positioning
    /// hardware). `None` restores normal behavior.
    pub fn set_watch_error(&self, error: Option<GeolocationError>) {
        self.inner.lock().watch_error = error;
    }

    /// True while a watch is open and not cancelled.
    pub fn is_watching(&self) -> bool {
        self.inner
            .lock()
            .active
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Number of successful `watch()` calls so far.
    pub fn watches_opened(&self) -> u64 {
        self.inner.lock().watches_opened
    }
}

impl PositionProvider for ChannelProvider {
    fn watch(&self) -> Result<PositionWatch, GeolocationError> {
        let mut inner = self.inner.lock();
        if let Some(error) = &inner.watch_error {
            return Err(error.clone());
        }

        let (tx, _cancel, watch) = PositionWatch::channel();
        inner.active = Some(tx);
        inner.watches_opened += 1;
        Ok(watch)
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Location;

    #[tokio::test]
    async fn test_push_reaches_active_watch() {
        let provider = ChannelProvider::new();
        assert!(!provider.push(Ok(Location::new(0.0, 0.0, 0))));

        let mut watch = provider.watch().unwrap();
        assert!(provider.is_watching());
        assert!(provider.push(Ok(Location::new(1.0, 2.0, 3))));

        assert_eq!(watch.next().await.unwrap().unwrap().longitude, 2.0);
    }

    #[tokio::test]
    async fn test_push_after_cancel_is_dropped() {
        let provider = ChannelProvider::new();
        let mut watch = provider.watch().unwrap();

        watch.cancel();
        assert!(!provider.is_watching());
        assert!(!provider.push(Ok(Location::new(1.0, 2.0, 3))));
    }

    #[tokio::test]
    async fn test_watch_error() {
        let provider = ChannelProvider::new();
        provider.set_watch_error(Some(GeolocationError::position_unavailable(
            "geolocation not supported",
        )));

        assert!(provider.watch().is_err());
        assert_eq!(provider.watches_opened(), 0);

        provider.set_watch_error(None);
        assert!(provider.watch().is_ok());
        assert_eq!(provider.watches_opened(), 1);
    }
}
