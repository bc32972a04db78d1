//! Display facts derived from the consumer snapshot.

use chrono::{DateTime, Local};

use super::staleness::format_staleness;
use super::sync::ConsumerSnapshot;
use crate::producer::GeolocationError;
use crate::record::{AdditionalStatus, BusRecord, DriverError, Location};
use crate::store::StoreError;

/// What the observer should be shown about the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum SharingDisplay {
    /// Nothing received from the store yet.
    Connecting,
    /// The store holds no record.
    NoData,
    /// No producer is sharing. The last position may still be shown.
    Inactive { last_known: Option<Location> },
    /// Not sharing, but the producer left an error behind.
    Halted {
        last_known: Option<Location>,
        error: DriverError,
    },
    /// Sharing has begun but no position has arrived.
    Acquiring { error: Option<DriverError> },
    /// Sharing with a healthy position.
    Live { location: Location },
    /// Sharing, but the producer's device reports a problem. The last known
    /// position is still shown.
    Degraded {
        last_known: Location,
        error: DriverError,
    },
}

impl SharingDisplay {
    /// Derive the display from a snapshot.
    pub fn from_snapshot(snapshot: &ConsumerSnapshot) -> Self {
        if !snapshot.received_any {
            return SharingDisplay::Connecting;
        }
        match &snapshot.record {
            Some(record) => Self::from_record(record),
            None => SharingDisplay::NoData,
        }
    }

    /// Derive the display from a record.
    pub fn from_record(record: &BusRecord) -> Self {
        let error = record.driver_reported_error.clone();
        let location = record.location.clone();

        match (record.is_sharing, location, error) {
            (false, last_known, None) => SharingDisplay::Inactive { last_known },
            (false, last_known, Some(error)) => SharingDisplay::Halted { last_known, error },
            (true, None, error) => SharingDisplay::Acquiring { error },
            (true, Some(location), None) => SharingDisplay::Live { location },
            (true, Some(last_known), Some(error)) => SharingDisplay::Degraded { last_known, error },
        }
    }

    /// Position to put on the map, if any.
    pub fn location(&self) -> Option<&Location> {
        match self {
            SharingDisplay::Inactive { last_known } | SharingDisplay::Halted { last_known, .. } => {
                last_known.as_ref()
            }
            SharingDisplay::Live { location } => Some(location),
            SharingDisplay::Degraded { last_known, .. } => Some(last_known),
            _ => None,
        }
    }

    /// Device error to warn about, if any.
    pub fn warning(&self) -> Option<&DriverError> {
        match self {
            SharingDisplay::Halted { error, .. } | SharingDisplay::Degraded { error, .. } => {
                Some(error)
            }
            SharingDisplay::Acquiring { error } => error.as_ref(),
            _ => None,
        }
    }

    /// One-line status headline.
    pub fn headline(&self) -> &'static str {
        match self {
            SharingDisplay::Connecting => "Connecting to the store...",
            SharingDisplay::NoData => "No bus data yet",
            SharingDisplay::Inactive { .. } => "Location sharing inactive",
            SharingDisplay::Halted { .. } => "Location sharing stopped after a device error",
            SharingDisplay::Acquiring { .. } => "Waiting for the first position...",
            SharingDisplay::Live { .. } => "Live",
            SharingDisplay::Degraded { .. } => "Live (degraded, showing last known position)",
        }
    }
}

/// Trip status as shown to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripStatus {
    pub incident: Option<bool>,
    pub seats: Option<bool>,
    /// Age of the last status report.
    pub updated: String,
}

impl TripStatus {
    fn new(status: &AdditionalStatus, now_millis: i64) -> Self {
        Self {
            incident: status.incident_reported,
            seats: status.seats_available,
            updated: format_staleness(now_millis, status.last_status_update),
        }
    }

    fn incident_text(&self) -> &'static str {
        match self.incident {
            Some(true) => "reported (accident or traffic jam)",
            Some(false) => "none",
            None => "not reported",
        }
    }

    fn seats_text(&self) -> &'static str {
        match self.seats {
            Some(true) => "available",
            Some(false) => "full",
            None => "not reported",
        }
    }
}

/// Everything an observer screen renders, computed at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerView {
    pub display: SharingDisplay,
    pub connection_error: Option<StoreError>,
    /// Age of `lastUpdatedAt`.
    pub last_updated: String,
    pub trip: Option<TripStatus>,
}

impl ConsumerView {
    pub fn new(snapshot: &ConsumerSnapshot, now_millis: i64) -> Self {
        let record = snapshot.record.as_ref();
        Self {
            display: SharingDisplay::from_snapshot(snapshot),
            connection_error: snapshot.connection_error.clone(),
            last_updated: format_staleness(now_millis, record.and_then(|r| r.last_updated_at)),
            trip: record
                .map(|r| &r.additional_status)
                .filter(|s| s.is_reported())
                .map(|s| TripStatus::new(s, now_millis)),
        }
    }

    /// Plain-text rendering, one line per fact.
    pub fn render_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("Status: {}", self.display.headline())];

        if let Some(location) = self.display.location() {
            lines.push(format_position(location));
            if let Some(motion) = format_motion(location) {
                lines.push(motion);
            }
            lines.push(format!("Fix time: {}", format_clock_time(location.timestamp)));
        }

        if !matches!(self.display, SharingDisplay::Connecting) {
            lines.push(format!("Last update: {}", self.last_updated));
        }

        if let Some(error) = self.display.warning() {
            let error = GeolocationError::from(error);
            lines.push(format!(
                "Warning: driver device reports {} ({})",
                error.code.label(),
                error.message
            ));
        }

        if let Some(trip) = &self.trip {
            lines.push(format!("Incident: {}", trip.incident_text()));
            lines.push(format!("Seats: {}", trip.seats_text()));
            lines.push(format!("Status updated: {}", trip.updated));
        }

        if let Some(error) = &self.connection_error {
            lines.push(format!("Connection problem: {} (showing last known data)", error));
        }

        lines
    }
}

fn format_position(location: &Location) -> String {
    match location.accuracy {
        Some(accuracy) => format!(
            "Position: {:.5}, {:.5} (±{:.0} m)",
            location.latitude, location.longitude, accuracy
        ),
        None => format!("Position: {:.5}, {:.5}", location.latitude, location.longitude),
    }
}

fn format_motion(location: &Location) -> Option<String> {
    match (location.speed_kmh(), location.heading) {
        (Some(speed), Some(heading)) => {
            Some(format!("Speed: {:.0} km/h, heading {:.0}°", speed, heading))
        }
        (Some(speed), None) => Some(format!("Speed: {:.0} km/h", speed)),
        (None, Some(heading)) => Some(format!("Heading: {:.0}°", heading)),
        (None, None) => None,
    }
}

/// Local wall-clock time of an epoch-millisecond timestamp.
pub fn format_clock_time(millis: i64) -> String {
    match DateTime::from_timestamp_millis(millis) {
        Some(utc) => utc.with_timezone(&Local).format("%H:%M:%S").to_string(),
        None => "N/A".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FeedEvent;

    const NOW: i64 = 1_760_000_000_000;

    fn received(record: BusRecord) -> ConsumerSnapshot {
        let mut snapshot = ConsumerSnapshot::default();
        snapshot.apply(FeedEvent::Snapshot(Some(record)));
        snapshot
    }

    fn unavailable() -> DriverError {
        DriverError {
            code: 2,
            message: "Position unavailable".to_string(),
        }
    }

    #[test]
    fn test_connecting_and_no_data() {
        assert_eq!(
            SharingDisplay::from_snapshot(&ConsumerSnapshot::default()),
            SharingDisplay::Connecting
        );

        let mut snapshot = ConsumerSnapshot::default();
        snapshot.apply(FeedEvent::Snapshot(None));
        assert_eq!(SharingDisplay::from_snapshot(&snapshot), SharingDisplay::NoData);
    }

    #[test]
    fn test_inactive_keeps_last_known() {
        let record = BusRecord {
            location: Some(Location::new(1.0, 2.0, 0)),
            ..BusRecord::default()
        };
        let display = SharingDisplay::from_record(&record);

        assert!(matches!(display, SharingDisplay::Inactive { last_known: Some(_) }));
        assert!(display.warning().is_none());
    }

    #[test]
    fn test_acquiring_without_location() {
        let record = BusRecord {
            is_sharing: true,
            ..BusRecord::default()
        };
        assert_eq!(
            SharingDisplay::from_record(&record),
            SharingDisplay::Acquiring { error: None }
        );
    }

    #[test]
    fn test_degraded_shows_location_and_warning() {
        let record = BusRecord {
            is_sharing: true,
            location: Some(Location::new(18.4861, -69.9312, NOW - 10_000)),
            last_updated_at: Some(NOW - 10_000),
            driver_reported_error: Some(unavailable()),
            ..BusRecord::default()
        };
        let view = ConsumerView::new(&received(record), NOW);

        assert!(matches!(view.display, SharingDisplay::Degraded { .. }));
        assert_eq!(view.display.location().unwrap().latitude, 18.4861);

        let lines = view.render_lines();
        assert!(lines.iter().any(|l| l == "Position: 18.48610, -69.93120"));
        assert!(lines
            .iter()
            .any(|l| l == "Warning: driver device reports position unavailable (Position unavailable)"));
        assert!(lines.iter().any(|l| l == "Last update: 10s ago"));
    }

    #[test]
    fn test_halted_when_error_remains_after_stop() {
        let record = BusRecord {
            driver_reported_error: Some(unavailable()),
            ..BusRecord::default()
        };
        let display = SharingDisplay::from_record(&record);
        assert!(matches!(display, SharingDisplay::Halted { last_known: None, .. }));
        assert_eq!(display.warning(), Some(&unavailable()));
    }

    #[test]
    fn test_live_view_with_trip_status() {
        let record = BusRecord {
            is_sharing: true,
            location: Some(
                Location::new(1.0, 2.0, NOW)
                    .with_accuracy(12.4)
                    .with_motion(Some(10.0), Some(90.0)),
            ),
            last_updated_at: Some(NOW - 2_000),
            additional_status: AdditionalStatus {
                incident_reported: Some(true),
                seats_available: Some(false),
                last_status_update: Some(NOW - 125_000),
            },
            ..BusRecord::default()
        };
        let lines = ConsumerView::new(&received(record), NOW).render_lines();

        assert_eq!(lines[0], "Status: Live");
        assert!(lines.contains(&"Position: 1.00000, 2.00000 (±12 m)".to_string()));
        assert!(lines.contains(&"Speed: 36 km/h, heading 90°".to_string()));
        assert!(lines.iter().any(|l| l.starts_with("Fix time: ")));
        assert!(lines.contains(&"Last update: just now".to_string()));
        assert!(lines.contains(&"Incident: reported (accident or traffic jam)".to_string()));
        assert!(lines.contains(&"Seats: full".to_string()));
        assert!(lines.contains(&"Status updated: 2m ago".to_string()));
    }

    #[test]
    fn test_connection_error_line_keeps_data() {
        let mut snapshot = received(BusRecord {
            is_sharing: true,
            location: Some(Location::new(1.0, 2.0, NOW)),
            ..BusRecord::default()
        });
        snapshot.apply(FeedEvent::Error(StoreError::Transport("timed out".to_string())));

        let view = ConsumerView::new(&snapshot, NOW);
        assert!(matches!(view.display, SharingDisplay::Live { .. }));
        assert!(view
            .render_lines()
            .last()
            .unwrap()
            .starts_with("Connection problem: Store request failed: timed out"));
    }

    #[test]
    fn test_unreported_trip_status_hidden() {
        let view = ConsumerView::new(&received(BusRecord::baseline()), NOW);
        assert!(view.trip.is_none());
        assert_eq!(view.last_updated, "N/A");
    }
}
