//! Connection verification against the store root.

use std::fmt;

use tracing::{info, warn};

use super::transport::HttpTransport;
use crate::store::StoreError;

/// Result of probing the store root with a shallow read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionCheck {
    /// The root answered normally.
    Reachable,
    /// The root answered but access rules rejected the read. The database
    /// exists and the network path works.
    ReachableButDenied,
    /// The endpoint exists but no database is provisioned behind it.
    DatabaseMissing,
    /// Any other HTTP failure.
    Failed { status: u16, message: String },
    /// No HTTP response at all.
    Unreachable(String),
}

impl ConnectionCheck {
    /// Returns true if the store can be reached.
    pub fn is_reachable(&self) -> bool {
        matches!(
            self,
            ConnectionCheck::Reachable | ConnectionCheck::ReachableButDenied
        )
    }
}

impl fmt::Display for ConnectionCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionCheck::Reachable => write!(f, "store reachable"),
            ConnectionCheck::ReachableButDenied => {
                write!(f, "store reachable (root read denied by access rules)")
            }
            ConnectionCheck::DatabaseMissing => {
                write!(f, "no database found at this URL; check the database URL")
            }
            ConnectionCheck::Failed { status, message } => {
                write!(f, "store returned HTTP {}: {}", status, message)
            }
            ConnectionCheck::Unreachable(reason) => write!(f, "store unreachable: {}", reason),
        }
    }
}

/// Probe `url` (the shallow root read) and classify the outcome.
pub async fn check_connection<T: HttpTransport>(transport: &T, url: &str) -> ConnectionCheck {
    let response = match transport.get(url).await {
        Ok(response) => response,
        Err(StoreError::Transport(reason)) | Err(StoreError::Unavailable(reason)) => {
            warn!(reason = %reason, "Store connection probe failed");
            return ConnectionCheck::Unreachable(reason);
        }
        Err(e) => {
            warn!(error = %e, "Store connection probe failed");
            return ConnectionCheck::Unreachable(e.to_string());
        }
    };

    if response.is_success() {
        info!(status = response.status, "Store connection verified");
        return ConnectionCheck::Reachable;
    }

    let message = response.error_message();
    let lowered = message.to_lowercase();
    let check = if lowered.contains("permission denied") {
        ConnectionCheck::ReachableButDenied
    } else if lowered.contains("service not available") {
        ConnectionCheck::DatabaseMissing
    } else {
        ConnectionCheck::Failed {
            status: response.status,
            message,
        }
    };

    info!(status = response.status, result = %check, "Store connection probe finished");
    check
}

#[cfg(test)]
mod tests {
    use super::super::transport::tests::MockTransport;
    use super::*;

    #[tokio::test]
    async fn test_ok_is_reachable() {
        let transport = MockTransport::responding(200, r#"{"busData":true}"#);
        let check = check_connection(&transport, "https://db/.json?shallow=true").await;
        assert_eq!(check, ConnectionCheck::Reachable);
        assert!(check.is_reachable());
    }

    #[tokio::test]
    async fn test_permission_denied_counts_as_reachable() {
        let transport = MockTransport::responding(401, r#"{"error":"Permission denied"}"#);
        let check = check_connection(&transport, "https://db/.json?shallow=true").await;
        assert_eq!(check, ConnectionCheck::ReachableButDenied);
        assert!(check.is_reachable());
    }

    #[tokio::test]
    async fn test_service_not_available_is_missing_database() {
        let transport = MockTransport::responding(404, r#"{"error":"Service not available."}"#);
        let check = check_connection(&transport, "https://db/.json?shallow=true").await;
        assert_eq!(check, ConnectionCheck::DatabaseMissing);
        assert!(!check.is_reachable());
    }

    #[tokio::test]
    async fn test_other_status_fails() {
        let transport = MockTransport::responding(500, "oops");
        let check = check_connection(&transport, "https://db/.json?shallow=true").await;
        assert_eq!(
            check,
            ConnectionCheck::Failed {
                status: 500,
                message: "oops".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_transport_error_is_unreachable() {
        let transport = MockTransport::failing(StoreError::Transport("dns".to_string()));
        let check = check_connection(&transport, "https://db/.json?shallow=true").await;
        assert_eq!(check, ConnectionCheck::Unreachable("dns".to_string()));
    }
}
