//! Position provider abstraction.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::geolocation::GeolocationError;
use crate::record::Location;

/// One delivery from a position watch.
pub type PositionReading = Result<Location, GeolocationError>;

/// Channel capacity for provider readings.
pub const READING_CHANNEL_CAPACITY: usize = 32;

/// A live, cancellable position subscription.
///
/// Dropping the watch cancels it.
pub struct PositionWatch {
    readings: mpsc::Receiver<PositionReading>,
    cancel: CancellationToken,
}

impl PositionWatch {
    /// Create the watch end and the sender a provider task feeds.
    pub fn channel() -> (mpsc::Sender<PositionReading>, CancellationToken, Self) {
        let (tx, rx) = mpsc::channel(READING_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let watch = Self {
            readings: rx,
            cancel: cancel.clone(),
        };
        (tx, cancel, watch)
    }

    /// Next reading, or `None` once the provider has finished.
    pub async fn next(&mut self) -> Option<PositionReading> {
        self.readings.recv().await
    }

    /// Stop the provider. Readings already queued are discarded.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.readings.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for PositionWatch {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Source of continuous position samples.
pub trait PositionProvider: Send + Sync + 'static {
    /// Begin a continuous watch.
    ///
    /// Fails immediately when the source cannot be used at all. Failures
    /// during the watch arrive as `Err` readings.
    fn watch(&self) -> Result<PositionWatch, GeolocationError>;

    /// Name for logs.
    fn name(&self) -> &'static str;
}

impl<P: PositionProvider> PositionProvider for std::sync::Arc<P> {
    fn watch(&self) -> Result<PositionWatch, GeolocationError> {
        (**self).watch()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Send a reading unless the watch was cancelled. Returns false when the
/// provider should stop.
pub(crate) async fn emit(
    tx: &mpsc::Sender<PositionReading>,
    cancel: &CancellationToken,
    reading: PositionReading,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(reading) => sent.is_ok(),
    }
}
