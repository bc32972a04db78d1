//! Runtime backend selection.

use tracing::info;

use super::config::{BackendKind, StoreConfig};
use super::error::StoreError;
use super::memory::MemoryStore;
use super::rest::{ConnectionCheck, ReqwestTransport, RestStore};
use super::timestamp::{Stamper, TimestampMode};
use super::traits::{RecordStore, RecordStream};
use crate::record::{BusRecord, RecordPatch};
use crate::time::system_clock;

/// Store chosen from configuration.
pub enum StoreBackend {
    Memory(MemoryStore),
    Rest(RestStore<ReqwestTransport>),
}

impl StoreBackend {
    /// Build the configured backend.
    ///
    /// The REST backend requires `database_url`.
    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        match config.backend {
            BackendKind::Memory => {
                info!(timestamps = %config.timestamps, "Using in-memory store");
                Ok(StoreBackend::Memory(MemoryStore::with_clock(
                    config.timestamps,
                    system_clock(),
                )))
            }
            BackendKind::Rest => {
                let url = config
                    .database_url
                    .as_deref()
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
                    .ok_or_else(|| {
                        StoreError::Unavailable("no database URL configured".to_string())
                    })?;

                let transport = ReqwestTransport::new(config.request_timeout)?;
                let stamper = Stamper::new(config.timestamps, system_clock());
                let mut store = RestStore::new(transport, url, stamper);
                if let Some(token) = config.auth_token.as_deref().filter(|t| !t.is_empty()) {
                    store = store.with_auth_token(token);
                }

                info!(url = %store.base_url(), timestamps = %config.timestamps, "Using REST store");
                Ok(StoreBackend::Rest(store))
            }
        }
    }

    /// Probe connectivity. The in-memory backend is always reachable.
    pub async fn verify_connection(&self) -> ConnectionCheck {
        match self {
            StoreBackend::Memory(_) => ConnectionCheck::Reachable,
            StoreBackend::Rest(store) => store.verify_connection().await,
        }
    }
}

impl RecordStore for StoreBackend {
    async fn read(&self, path: &str) -> Result<Option<BusRecord>, StoreError> {
        match self {
            StoreBackend::Memory(store) => store.read(path).await,
            StoreBackend::Rest(store) => store.read(path).await,
        }
    }

    async fn update(&self, path: &str, patch: &RecordPatch) -> Result<(), StoreError> {
        match self {
            StoreBackend::Memory(store) => store.update(path, patch).await,
            StoreBackend::Rest(store) => store.update(path, patch).await,
        }
    }

    async fn replace(&self, path: &str, record: &BusRecord) -> Result<(), StoreError> {
        match self {
            StoreBackend::Memory(store) => store.replace(path, record).await,
            StoreBackend::Rest(store) => store.replace(path, record).await,
        }
    }

    async fn subscribe(&self, path: &str) -> Result<RecordStream, StoreError> {
        match self {
            StoreBackend::Memory(store) => store.subscribe(path).await,
            StoreBackend::Rest(store) => store.subscribe(path).await,
        }
    }

    fn timestamp_mode(&self) -> TimestampMode {
        match self {
            StoreBackend::Memory(store) => store.timestamp_mode(),
            StoreBackend::Rest(store) => store.timestamp_mode(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_requires_url() {
        let result = StoreBackend::from_config(&StoreConfig::default());
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[test]
    fn test_rest_backend_built_from_url() {
        let config = StoreConfig {
            database_url: Some("https://bus-demo.example.com/".to_string()),
            auth_token: Some("tok".to_string()),
            timestamps: TimestampMode::Local,
            ..StoreConfig::default()
        };

        let backend = StoreBackend::from_config(&config).unwrap();
        assert!(matches!(backend, StoreBackend::Rest(_)));
        assert_eq!(backend.timestamp_mode(), TimestampMode::Local);
    }

    #[tokio::test]
    async fn test_memory_backend_round_trip() {
        let backend = StoreBackend::from_config(&StoreConfig::memory()).unwrap();

        backend
            .update("bus", &RecordPatch::new().sharing(true))
            .await
            .unwrap();
        assert!(backend.read("bus").await.unwrap().unwrap().is_sharing);
        assert_eq!(backend.verify_connection().await, ConnectionCheck::Reachable);
    }
}
