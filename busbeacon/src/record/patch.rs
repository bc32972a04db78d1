//! Partial record updates.
//!
//! A [`RecordPatch`] names only the fields a write touches. It renders to a
//! multi-path update map where nested trip-status fields use slash-separated
//! keys (`additionalStatus/incidentReported`), so reporting one flag never
//! clobbers the other.

use serde_json::{Map, Value};

use super::model::{DriverError, Location};

const KEY_LOCATION: &str = "location";
const KEY_IS_SHARING: &str = "isSharing";
const KEY_DRIVER_ERROR: &str = "driverReportedError";
const KEY_LAST_UPDATED_AT: &str = "lastUpdatedAt";
const KEY_INCIDENT: &str = "additionalStatus/incidentReported";
const KEY_SEATS: &str = "additionalStatus/seatsAvailable";
const KEY_STATUS_UPDATE: &str = "additionalStatus/lastStatusUpdate";

/// Fields to merge into the shared record.
///
/// `Option<Option<T>>` fields distinguish "leave untouched" (`None`) from
/// "set to null" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    location: Option<Option<Location>>,
    is_sharing: Option<bool>,
    driver_reported_error: Option<Option<DriverError>>,
    incident_reported: Option<bool>,
    seats_available: Option<bool>,
    refresh_status_update: bool,
}

impl RecordPatch {
    /// Create an empty patch (only `lastUpdatedAt` will be written).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reported location.
    pub fn location(mut self, location: Location) -> Self {
        self.location = Some(Some(location));
        self
    }

    /// Set the sharing flag.
    pub fn sharing(mut self, is_sharing: bool) -> Self {
        self.is_sharing = Some(is_sharing);
        self
    }

    /// Set or clear the driver-reported geolocation error.
    pub fn driver_error(mut self, error: Option<DriverError>) -> Self {
        self.driver_reported_error = Some(error);
        self
    }

    /// Report an incident flag; refreshes `lastStatusUpdate`.
    pub fn incident_reported(mut self, reported: bool) -> Self {
        self.incident_reported = Some(reported);
        self.refresh_status_update = true;
        self
    }

    /// Report seat availability; refreshes `lastStatusUpdate`.
    pub fn seats_available(mut self, available: bool) -> Self {
        self.seats_available = Some(available);
        self.refresh_status_update = true;
        self
    }

    /// Render as a multi-path update map stamped with `stamp`.
    ///
    /// `lastUpdatedAt` is always present; `lastStatusUpdate` receives the same
    /// stamp when a status flag is reported.
    pub fn to_fields(&self, stamp: &Value) -> Result<Map<String, Value>, serde_json::Error> {
        let mut fields = Map::new();

        if let Some(location) = &self.location {
            fields.insert(KEY_LOCATION.to_string(), serde_json::to_value(location)?);
        }
        if let Some(is_sharing) = self.is_sharing {
            fields.insert(KEY_IS_SHARING.to_string(), Value::Bool(is_sharing));
        }
        if let Some(error) = &self.driver_reported_error {
            fields.insert(KEY_DRIVER_ERROR.to_string(), serde_json::to_value(error)?);
        }
        if let Some(reported) = self.incident_reported {
            fields.insert(KEY_INCIDENT.to_string(), Value::Bool(reported));
        }
        if let Some(available) = self.seats_available {
            fields.insert(KEY_SEATS.to_string(), Value::Bool(available));
        }
        if self.refresh_status_update {
            fields.insert(KEY_STATUS_UPDATE.to_string(), stamp.clone());
        }
        fields.insert(KEY_LAST_UPDATED_AT.to_string(), stamp.clone());

        Ok(fields)
    }
}

/// Apply a multi-path update map to a document.
pub fn apply_fields(document: &mut Value, fields: &Map<String, Value>) {
    for (path, value) in fields {
        set_at_path(document, path, value.clone());
    }
}

/// Merge `children` under `path`, leaving siblings untouched.
pub fn merge_at_path(document: &mut Value, path: &str, children: &Map<String, Value>) {
    let base = path.trim_end_matches('/');
    for (key, value) in children {
        set_at_path(document, &format!("{}/{}", base, key), value.clone());
    }
}

/// Replace the subtree at a slash-separated `path`.
///
/// An empty path (or `/`) replaces the whole document. Writing `null` deletes
/// the leaf, matching the store's handling of null values.
pub fn set_at_path(document: &mut Value, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let Some((leaf, parents)) = segments.split_last() else {
        *document = value;
        return;
    };

    let mut node = document;
    for segment in parents {
        node = ensure_object(node)
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    let object = ensure_object(node);
    if value.is_null() {
        object.remove(*leaf);
    } else {
        object.insert(leaf.to_string(), value);
    }
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_patch_only_stamps() {
        let fields = RecordPatch::new().to_fields(&json!(42)).unwrap();

        assert_eq!(fields.len(), 1);
        assert_eq!(fields["lastUpdatedAt"], json!(42));
    }

    #[test]
    fn test_clear_error_renders_null() {
        let fields = RecordPatch::new()
            .sharing(false)
            .driver_error(None)
            .to_fields(&json!(1))
            .unwrap();

        assert_eq!(fields["isSharing"], json!(false));
        assert_eq!(fields["driverReportedError"], Value::Null);
        assert!(!fields.contains_key("location"));
    }

    #[test]
    fn test_status_report_refreshes_status_time() {
        let fields = RecordPatch::new()
            .seats_available(true)
            .to_fields(&json!(77))
            .unwrap();

        assert_eq!(fields["additionalStatus/seatsAvailable"], json!(true));
        assert_eq!(fields["additionalStatus/lastStatusUpdate"], json!(77));
        assert!(!fields.contains_key("additionalStatus/incidentReported"));
    }

    #[test]
    fn test_apply_fields_merges_nested_status() {
        let mut document = json!({
            "isSharing": true,
            "additionalStatus": {"incidentReported": true, "lastStatusUpdate": 1}
        });

        let fields = RecordPatch::new()
            .seats_available(false)
            .to_fields(&json!(2))
            .unwrap();
        apply_fields(&mut document, &fields);

        assert_eq!(document["isSharing"], json!(true));
        assert_eq!(document["additionalStatus"]["incidentReported"], json!(true));
        assert_eq!(document["additionalStatus"]["seatsAvailable"], json!(false));
        assert_eq!(document["additionalStatus"]["lastStatusUpdate"], json!(2));
    }

    #[test]
    fn test_set_at_root_replaces_document() {
        let mut document = json!({"a": 1});
        set_at_path(&mut document, "/", json!({"b": 2}));
        assert_eq!(document, json!({"b": 2}));
    }

    #[test]
    fn test_set_null_removes_leaf() {
        let mut document = json!({"driverReportedError": {"code": 1, "message": "x"}, "isSharing": true});
        set_at_path(&mut document, "/driverReportedError", Value::Null);
        assert_eq!(document, json!({"isSharing": true}));
    }

    #[test]
    fn test_set_into_null_document_creates_parents() {
        let mut document = Value::Null;
        set_at_path(&mut document, "additionalStatus/seatsAvailable", json!(true));
        assert_eq!(document, json!({"additionalStatus": {"seatsAvailable": true}}));
    }

    #[test]
    fn test_merge_at_path() {
        let mut document = json!({"location": {"latitude": 1.0, "longitude": 2.0}});
        let children = json!({"latitude": 3.0, "timestamp": 9}).as_object().unwrap().clone();

        merge_at_path(&mut document, "/location", &children);

        assert_eq!(
            document,
            json!({"location": {"latitude": 3.0, "longitude": 2.0, "timestamp": 9}})
        );
    }
}
