//! Shared bus record.
//!
//! A single JSON document at a fixed store path carries everything observers
//! see: the last reported position, whether the producer is sharing, trip
//! status flags and the last geolocation failure on the producer's device.
//!
//! # Components
//!
//! - [`model`] - `BusRecord` and its nested value types
//! - [`patch`] - `RecordPatch` partial updates and JSON document helpers

mod model;
mod patch;

pub use model::{AdditionalStatus, BusRecord, DriverError, Location, DEFAULT_RECORD_PATH};
pub use patch::{apply_fields, merge_at_path, set_at_path, RecordPatch};
