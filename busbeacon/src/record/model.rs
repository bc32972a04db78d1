//! Record value types.
//!
//! Field names on the wire are camelCase to stay compatible with existing
//! web observers reading the same document. Every field tolerates being
//! absent: the store drops null leaves, so a missing key decodes to its
//! null/false default.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default logical path of the shared record.
pub const DEFAULT_RECORD_PATH: &str = "busData/live";

/// Device-reported position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,

    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,

    /// Producer's local clock at sample time (epoch milliseconds).
    pub timestamp: i64,

    /// Horizontal accuracy radius in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,

    /// Ground speed in meters per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,

    /// Direction of travel in degrees clockwise from true north.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
}

impl Location {
    /// Create a location with only coordinates and a sample time.
    pub fn new(latitude: f64, longitude: f64, timestamp: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
            accuracy: None,
            speed: None,
            heading: None,
        }
    }

    /// Attach an accuracy radius in meters.
    pub fn with_accuracy(mut self, meters: f64) -> Self {
        self.accuracy = Some(meters);
        self
    }

    /// Attach ground speed (m/s) and heading (degrees).
    pub fn with_motion(mut self, speed: Option<f64>, heading: Option<f64>) -> Self {
        self.speed = speed;
        self.heading = heading;
        self
    }

    /// Returns true if the coordinates are finite and in range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Ground speed converted to km/h.
    pub fn speed_kmh(&self) -> Option<f64> {
        self.speed.map(|s| s * 3.6)
    }
}

/// Last geolocation failure surfaced by the producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverError {
    /// Geolocation error code (0 unknown, 1 permission, 2 unavailable, 3 timeout).
    pub code: i32,

    /// Platform-supplied message.
    pub message: String,
}

/// Trip status entered by the driver or collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalStatus {
    /// Accident or traffic jam reported; `None` when never reported.
    #[serde(default)]
    pub incident_reported: Option<bool>,

    /// Seats left on board; `None` when never reported.
    #[serde(default)]
    pub seats_available: Option<bool>,

    /// When either flag was last reported (epoch milliseconds).
    #[serde(default)]
    pub last_status_update: Option<i64>,
}

impl AdditionalStatus {
    /// Returns true if any status has ever been reported.
    pub fn is_reported(&self) -> bool {
        self.last_status_update.is_some()
    }
}

/// The single shared document describing the bus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusRecord {
    /// Last reported position, retained after sharing stops.
    #[serde(default)]
    pub location: Option<Location>,

    /// True only while a producer is actively watching position.
    #[serde(default)]
    pub is_sharing: bool,

    /// Store-assigned write time (epoch milliseconds).
    #[serde(default)]
    pub last_updated_at: Option<i64>,

    /// Driver/collaborator trip status.
    #[serde(default)]
    pub additional_status: AdditionalStatus,

    /// Last geolocation failure on the producer's device.
    #[serde(default)]
    pub driver_reported_error: Option<DriverError>,
}

impl BusRecord {
    /// The record written whenever no producer is active.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Decode a store document. A JSON `null` means "no record yet".
    pub fn from_json(value: Value) -> Result<Option<Self>, serde_json::Error> {
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value).map(Some)
    }

    /// Render this record as a full document with `lastUpdatedAt` set to `stamp`.
    ///
    /// `stamp` is either a concrete time or a server-time placeholder.
    pub fn to_document(&self, stamp: Value) -> Result<Value, serde_json::Error> {
        let mut document = serde_json::to_value(self)?;
        if let Value::Object(fields) = &mut document {
            fields.insert("lastUpdatedAt".to_string(), stamp);
        }
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_baseline_is_all_null() {
        let baseline = BusRecord::baseline();

        assert!(baseline.location.is_none());
        assert!(!baseline.is_sharing);
        assert!(baseline.last_updated_at.is_none());
        assert!(!baseline.additional_status.is_reported());
        assert!(baseline.driver_reported_error.is_none());
    }

    #[test]
    fn test_null_document_is_no_record() {
        assert_eq!(BusRecord::from_json(Value::Null).unwrap(), None);
    }

    #[test]
    fn test_sparse_document_decodes_with_defaults() {
        // Null leaves are dropped by the store, so only some keys come back
        let record = BusRecord::from_json(json!({
            "isSharing": true,
            "lastUpdatedAt": 1_700_000_000_000i64
        }))
        .unwrap()
        .unwrap();

        assert!(record.is_sharing);
        assert_eq!(record.last_updated_at, Some(1_700_000_000_000));
        assert!(record.location.is_none());
        assert_eq!(record.additional_status, AdditionalStatus::default());
    }

    #[test]
    fn test_camel_case_wire_names() {
        let record = BusRecord::from_json(json!({
            "location": {"latitude": 18.42, "longitude": -70.1, "timestamp": 5, "accuracy": 12.5},
            "isSharing": true,
            "additionalStatus": {"incidentReported": true, "seatsAvailable": null, "lastStatusUpdate": 9},
            "driverReportedError": {"code": 2, "message": "Position unavailable"}
        }))
        .unwrap()
        .unwrap();

        let location = record.location.unwrap();
        assert_eq!(location.accuracy, Some(12.5));
        assert!(location.speed.is_none());
        assert_eq!(record.additional_status.incident_reported, Some(true));
        assert_eq!(record.additional_status.last_status_update, Some(9));
        assert_eq!(record.driver_reported_error.unwrap().code, 2);
    }

    #[test]
    fn test_to_document_sets_stamp() {
        let document = BusRecord::baseline()
            .to_document(json!({".sv": "timestamp"}))
            .unwrap();

        assert_eq!(document["lastUpdatedAt"], json!({".sv": "timestamp"}));
        assert_eq!(document["isSharing"], json!(false));
        assert_eq!(document["location"], Value::Null);
    }

    #[test]
    fn test_location_validity() {
        assert!(Location::new(18.48, -69.93, 0).is_valid());
        assert!(!Location::new(91.0, 0.0, 0).is_valid());
        assert!(!Location::new(0.0, -180.5, 0).is_valid());
        assert!(!Location::new(f64::NAN, 0.0, 0).is_valid());
    }

    #[test]
    fn test_speed_kmh() {
        let location = Location::new(0.0, 0.0, 0).with_motion(Some(10.0), None);
        assert_eq!(location.speed_kmh(), Some(36.0));
    }
}
