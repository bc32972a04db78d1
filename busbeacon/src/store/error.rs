//! Error types for the store adapter.

use thiserror::Error;

/// Errors raised by a store backend on read, write or subscription.
///
/// A missing document is not an error: reads return `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The request never produced a response (DNS, TLS, connection reset, timeout).
    #[error("Store request failed: {0}")]
    Transport(String),

    /// The store answered with a non-2xx status.
    #[error("Store returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The response body was not a valid record.
    #[error("Failed to decode record: {0}")]
    Decode(String),

    /// The store is not reachable or not initialized.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A push subscription ended or was cancelled by the server.
    #[error("Subscription ended: {0}")]
    SubscriptionClosed(String),
}

impl StoreError {
    /// Returns true if the store rejected the request on access rules.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            StoreError::Http { status, message } => {
                *status == 401
                    || *status == 403
                    || message.to_lowercase().contains("permission denied")
            }
            StoreError::SubscriptionClosed(message) => {
                message.to_lowercase().contains("permission denied")
            }
            _ => false,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_detection() {
        let forbidden = StoreError::Http {
            status: 401,
            message: "Permission denied".to_string(),
        };
        assert!(forbidden.is_permission_denied());

        let server = StoreError::Http {
            status: 500,
            message: "Internal".to_string(),
        };
        assert!(!server.is_permission_denied());

        let transport = StoreError::Transport("connection reset".to_string());
        assert!(!transport.is_permission_denied());
    }

    #[test]
    fn test_display_includes_status() {
        let error = StoreError::Http {
            status: 503,
            message: "Service Unavailable".to_string(),
        };
        assert_eq!(error.to_string(), "Store returned HTTP 503: Service Unavailable");
    }
}
