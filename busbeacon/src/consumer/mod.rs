//! Consumer side: follow the shared record and derive what to display.

mod display;
mod staleness;
mod sync;

pub use display::{format_clock_time, ConsumerView, SharingDisplay, TripStatus};
pub use staleness::{age_seconds, format_staleness};
pub use sync::{ConsumerSnapshot, ConsumerSync};
