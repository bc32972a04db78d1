//! Producer side: position acquisition and the sharing state machine.
//!
//! ```text
//! PositionProvider (gpsd / replay / channel)
//!         │ PositionWatch (cancellable)
//!         ▼
//! LocationSharer ──► writer task ──► RecordStore
//!         │
//!         └── watch::Receiver<ProducerStatus>
//! ```

mod backend;
mod channel;
mod geolocation;
mod gpsd;
mod replay;
mod sharer;
mod source;
mod state;
mod writer;

pub use backend::{PositionBackend, ProducerConfig, SourceKind};
pub use channel::ChannelProvider;
pub use geolocation::{GeolocationError, GeolocationErrorCode};
pub use gpsd::{
    GpsdConfig, GpsdProvider, DEFAULT_ACQUISITION_TIMEOUT_SECS, DEFAULT_GPSD_HOST,
    DEFAULT_GPSD_PORT,
};
pub use replay::{
    parse_track, ReplayConfig, ReplayEntry, ReplayError, ReplayProvider,
    DEFAULT_REPLAY_INTERVAL_MS,
};
pub use sharer::LocationSharer;
pub use source::{PositionProvider, PositionReading, PositionWatch};
pub use state::{ProducerStatus, SharingState};
