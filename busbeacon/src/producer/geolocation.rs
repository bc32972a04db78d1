//! Geolocation error classification.
//!
//! Every acquisition failure carries one of four codes. All codes get the
//! same state-machine handling (store the error, keep watching); they only
//! differ in the remediation hint shown to the operator.

use std::fmt;

use thiserror::Error;

use crate::record::DriverError;

/// Geolocation failure codes as written to the shared record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeolocationErrorCode {
    Unknown = 0,
    PermissionDenied = 1,
    PositionUnavailable = 2,
    Timeout = 3,
}

impl GeolocationErrorCode {
    /// Numeric wire code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map a wire code back. Out-of-range codes are `Unknown`.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => GeolocationErrorCode::PermissionDenied,
            2 => GeolocationErrorCode::PositionUnavailable,
            3 => GeolocationErrorCode::Timeout,
            _ => GeolocationErrorCode::Unknown,
        }
    }

    /// Short label for logs and status lines.
    pub fn label(self) -> &'static str {
        match self {
            GeolocationErrorCode::Unknown => "unknown error",
            GeolocationErrorCode::PermissionDenied => "permission denied",
            GeolocationErrorCode::PositionUnavailable => "position unavailable",
            GeolocationErrorCode::Timeout => "timeout",
        }
    }
}

impl fmt::Display for GeolocationErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}

/// A position acquisition failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Geolocation {code}: {message}")]
pub struct GeolocationError {
    pub code: GeolocationErrorCode,
    pub message: String,
}

impl GeolocationError {
    pub fn new(code: GeolocationErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(GeolocationErrorCode::Unknown, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(GeolocationErrorCode::PermissionDenied, message)
    }

    pub fn position_unavailable(message: impl Into<String>) -> Self {
        Self::new(GeolocationErrorCode::PositionUnavailable, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(GeolocationErrorCode::Timeout, message)
    }

    /// True when access is blocked by host policy rather than a user decision.
    pub fn is_policy_block(&self) -> bool {
        self.code == GeolocationErrorCode::PermissionDenied
            && self.message.to_lowercase().contains("permissions policy")
    }

    /// What the operator can do about it.
    pub fn remediation(&self) -> &'static str {
        match self.code {
            GeolocationErrorCode::PermissionDenied if self.is_policy_block() => {
                "Location access is blocked by a permissions policy on this host. \
                 Ask the administrator to allow geolocation, then start sharing again."
            }
            GeolocationErrorCode::PermissionDenied => {
                "Location permission was denied. Allow location access for this \
                 application in the device settings, then start sharing again."
            }
            GeolocationErrorCode::PositionUnavailable => {
                "The device could not determine its position. Check that location \
                 services are enabled and the GPS receiver has a clear view of the sky."
            }
            GeolocationErrorCode::Timeout => {
                "Getting a position took too long. Sharing keeps trying; move to an \
                 open area if it persists."
            }
            GeolocationErrorCode::Unknown => {
                "An unexpected location error occurred. Stop and start sharing again."
            }
        }
    }

    /// Form written to `driverReportedError`.
    pub fn to_driver_error(&self) -> DriverError {
        DriverError {
            code: self.code.code(),
            message: self.message.clone(),
        }
    }
}

impl From<&DriverError> for GeolocationError {
    fn from(error: &DriverError) -> Self {
        Self::new(GeolocationErrorCode::from_code(error.code), error.message.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for code in 0..4 {
            assert_eq!(GeolocationErrorCode::from_code(code).code(), code);
        }
        assert_eq!(GeolocationErrorCode::from_code(42), GeolocationErrorCode::Unknown);
    }

    #[test]
    fn test_each_code_has_distinct_hint() {
        let hints = [
            GeolocationError::unknown("x").remediation(),
            GeolocationError::permission_denied("x").remediation(),
            GeolocationError::position_unavailable("x").remediation(),
            GeolocationError::timeout("x").remediation(),
        ];
        for (i, a) in hints.iter().enumerate() {
            for b in hints.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_policy_block_hint() {
        let policy = GeolocationError::permission_denied(
            "Geolocation has been disabled in this document by permissions policy.",
        );
        let user = GeolocationError::permission_denied("User denied Geolocation");

        assert!(policy.is_policy_block());
        assert!(!user.is_policy_block());
        assert_ne!(policy.remediation(), user.remediation());
    }

    #[test]
    fn test_driver_error_conversion() {
        let error = GeolocationError::position_unavailable("no fix");
        let driver = error.to_driver_error();

        assert_eq!(driver.code, 2);
        assert_eq!(driver.message, "no fix");
        assert_eq!(GeolocationError::from(&driver), error);
    }

    #[test]
    fn test_display() {
        let error = GeolocationError::timeout("no sample within 30s");
        assert_eq!(
            error.to_string(),
            "Geolocation timeout (3): no sample within 30s"
        );
    }
}
