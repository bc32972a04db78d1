//! Store adapter for the shared bus record.
//!
//! All producers and consumers talk to the record through [`RecordStore`].
//!
//! ```text
//! RecordStore trait
//!   ├── MemoryStore            in-process, watch-channel subscriptions
//!   ├── RestStore<T>           HTTPS JSON database, SSE subscriptions
//!   └── StoreBackend           runtime choice between the two
//!
//! open_feed(store, path, FeedMode) → FeedHandle (push or poll)
//! ```

mod backend;
mod config;
mod error;
mod feed;
mod memory;
pub mod rest;
mod timestamp;
mod traits;

pub use backend::StoreBackend;
pub use config::{BackendKind, StoreConfig, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use error::StoreError;
pub use feed::{
    open_feed, FeedEvent, FeedHandle, FeedMode, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL,
};
pub use memory::{MemoryStore, WriteEntry, WriteKind};
pub use rest::{ConnectionCheck, RestStore};
pub use timestamp::{is_server_timestamp, server_timestamp_placeholder, Stamper, TimestampMode};
pub use traits::{RecordStore, RecordStream};
