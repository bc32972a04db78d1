//! Time-related utility functions.
//!
//! Every timestamp in the shared record is expressed in milliseconds since the
//! Unix epoch. Components never call `SystemTime::now()` directly; they take a
//! [`Clock`] so tests can drive time by hand.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of wall-clock time in epoch milliseconds.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// Clock backed by the operating system's wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        system_time_to_millis(SystemTime::now())
    }
}

/// Manually driven clock for tests and simulations.
///
/// Clones share the same underlying time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    /// Create a clock frozen at `millis`.
    pub fn new(millis: i64) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(millis)),
        }
    }

    /// Jump to an absolute time. Going backwards is allowed (simulated skew).
    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Convert a `SystemTime` to epoch milliseconds.
///
/// Times before the epoch come back negative rather than failing.
///
/// # Example
///
/// ```
/// use std::time::{Duration, UNIX_EPOCH};
/// use busbeacon::time::system_time_to_millis;
///
/// let t = UNIX_EPOCH + Duration::from_millis(1_500);
/// assert_eq!(system_time_to_millis(t), 1_500);
/// ```
pub fn system_time_to_millis(system_time: SystemTime) -> i64 {
    match system_time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_millis() as i64,
        Err(e) => -(e.duration().as_millis() as i64),
    }
}

/// Shared handle to the system clock.
pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}
