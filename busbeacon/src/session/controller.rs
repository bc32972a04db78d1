//! Session controller.
//!
//! Mediates role transitions and keeps the shared record in a known state:
//!
//! - leaving a producer role stops sharing first (awaiting the stop write)
//! - entering `None` replaces the record with the baseline
//! - entering a producer role writes `{isSharing: false, driverReportedError:
//!   null}` to clear leftovers from an earlier producer
//! - entering `Employee` reads the record once to confirm the store is there
//!
//! A failed transition leaves the session in `None` with the error recorded.

use std::mem;
use std::sync::Arc;

use tracing::{info, warn};

use super::error::SessionError;
use super::role::Role;
use crate::consumer::ConsumerSync;
use crate::producer::{LocationSharer, PositionProvider};
use crate::record::{BusRecord, RecordPatch, DEFAULT_RECORD_PATH};
use crate::store::{FeedMode, RecordStore};
use crate::time::Clock;

/// Session settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Logical path of the shared record.
    pub path: String,
    /// How the employee role follows the record.
    pub feed_mode: FeedMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_RECORD_PATH.to_string(),
            feed_mode: FeedMode::Push,
        }
    }
}

enum Active<P: PositionProvider> {
    Idle,
    Producer(LocationSharer<Arc<P>>),
    Consumer(ConsumerSync),
}

/// Role state machine for one local user.
pub struct SessionController<S: RecordStore, P: PositionProvider> {
    store: Arc<S>,
    provider: Arc<P>,
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    role: Role,
    requested: Role,
    active: Active<P>,
    initialization_error: Option<SessionError>,
}

impl<S: RecordStore, P: PositionProvider> SessionController<S, P> {
    pub fn new(
        store: Arc<S>,
        provider: Arc<P>,
        config: SessionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            provider,
            config,
            clock,
            role: Role::None,
            requested: Role::None,
            active: Active::Idle,
            initialization_error: None,
        }
    }

    /// Initial load: write the baseline record.
    ///
    /// Safe to call repeatedly.
    pub async fn initialize(&mut self) -> Result<(), SessionError> {
        self.select_role(Role::None).await
    }

    /// Switch to `role`.
    ///
    /// Selecting the current non-`None` role again is a no-op.
    pub async fn select_role(&mut self, role: Role) -> Result<(), SessionError> {
        if role == self.role && role != Role::None {
            return Ok(());
        }

        let previous = self.role;
        self.leave_current().await;
        self.requested = role;

        let result = match role {
            Role::None => self.enter_none().await,
            Role::Driver | Role::Collaborator => self.enter_producer(role).await,
            Role::Employee => self.enter_consumer().await,
        };

        match result {
            Ok(()) => {
                info!(from = %previous, to = %role, "Role changed");
                self.initialization_error = None;
                Ok(())
            }
            Err(e) => {
                warn!(role = %role, error = %e, "Role initialization failed");
                self.initialization_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Return to `None`.
    pub async fn reset_role(&mut self) -> Result<(), SessionError> {
        self.select_role(Role::None).await
    }

    /// Enter the last requested role again, typically after an
    /// initialization error.
    pub async fn retry(&mut self) -> Result<(), SessionError> {
        let role = self.requested;
        info!(role = %role, "Retrying role initialization");
        if role == self.role && role != Role::None {
            self.leave_current().await;
        }
        self.select_role(role).await
    }

    /// Release the active role without writing the baseline.
    ///
    /// A sharing producer is still stopped; the record is otherwise left as
    /// it is for other observers.
    pub async fn shutdown(&mut self) {
        self.leave_current().await;
        self.requested = Role::None;
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// The role most recently asked for (differs from `role()` after a
    /// failed transition).
    pub fn requested_role(&self) -> Role {
        self.requested
    }

    pub fn producer(&self) -> Option<&LocationSharer<Arc<P>>> {
        match &self.active {
            Active::Producer(sharer) => Some(sharer),
            _ => None,
        }
    }

    pub fn consumer(&self) -> Option<&ConsumerSync> {
        match &self.active {
            Active::Consumer(sync) => Some(sync),
            _ => None,
        }
    }

    pub fn initialization_error(&self) -> Option<&SessionError> {
        self.initialization_error.as_ref()
    }

    pub fn path(&self) -> &str {
        &self.config.path
    }

    async fn leave_current(&mut self) {
        match mem::replace(&mut self.active, Active::Idle) {
            Active::Idle => {}
            Active::Producer(sharer) => {
                if sharer.is_sharing() {
                    if let Err(e) = sharer.stop().await {
                        warn!(error = %e, "Stop write failed while leaving producer role");
                    }
                } else {
                    sharer.sync_writes().await;
                }
            }
            Active::Consumer(sync) => sync.close().await,
        }
        self.role = Role::None;
    }

    async fn enter_none(&mut self) -> Result<(), SessionError> {
        self.store
            .replace(&self.config.path, &BusRecord::baseline())
            .await
            .map_err(|source| SessionError::Initialization {
                role: Role::None,
                source,
            })
    }

    async fn enter_producer(&mut self, role: Role) -> Result<(), SessionError> {
        let guard = RecordPatch::new().sharing(false).driver_error(None);
        self.store
            .update(&self.config.path, &guard)
            .await
            .map_err(|source| SessionError::Initialization { role, source })?;

        let sharer = LocationSharer::new(
            Arc::clone(&self.store),
            self.config.path.clone(),
            Arc::clone(&self.provider),
            Arc::clone(&self.clock),
        );
        self.active = Active::Producer(sharer);
        self.role = role;
        Ok(())
    }

    async fn enter_consumer(&mut self) -> Result<(), SessionError> {
        self.store
            .read(&self.config.path)
            .await
            .map_err(|source| SessionError::Initialization {
                role: Role::Employee,
                source,
            })?;

        let sync = ConsumerSync::start(
            Arc::clone(&self.store),
            self.config.path.clone(),
            self.config.feed_mode,
        );
        self.active = Active::Consumer(sync);
        self.role = Role::Employee;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::ChannelProvider;
    use crate::store::{MemoryStore, StoreError};
    use crate::time::ManualClock;

    fn controller() -> (SessionController<MemoryStore, ChannelProvider>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let controller = SessionController::new(
            store.clone(),
            Arc::new(ChannelProvider::new()),
            SessionConfig::default(),
            Arc::new(ManualClock::new(0)),
        );
        (controller, store)
    }

    #[tokio::test]
    async fn test_initialize_writes_baseline() {
        let (mut controller, store) = controller();

        controller.initialize().await.unwrap();

        assert_eq!(controller.role(), Role::None);
        let record = store.document(DEFAULT_RECORD_PATH).unwrap();
        assert_eq!(
            BusRecord {
                last_updated_at: None,
                ..record
            },
            BusRecord::baseline()
        );
    }

    #[tokio::test]
    async fn test_producer_entry_guard_write() {
        let (mut controller, store) = controller();
        store
            .update(
                DEFAULT_RECORD_PATH,
                &RecordPatch::new().sharing(true).driver_error(Some(
                    crate::record::DriverError {
                        code: 3,
                        message: "stale".to_string(),
                    },
                )),
            )
            .await
            .unwrap();

        controller.select_role(Role::Collaborator).await.unwrap();

        let record = store.document(DEFAULT_RECORD_PATH).unwrap();
        assert!(!record.is_sharing);
        assert!(record.driver_reported_error.is_none());
        assert!(controller.producer().is_some());
        assert!(controller.consumer().is_none());
    }

    #[tokio::test]
    async fn test_employee_entry_starts_consumer() {
        let (mut controller, _store) = controller();

        controller.select_role(Role::Employee).await.unwrap();

        assert_eq!(controller.role(), Role::Employee);
        assert!(controller.consumer().is_some());
        assert!(controller.producer().is_none());
    }

    #[tokio::test]
    async fn test_failed_entry_keeps_controller_usable() {
        let (mut controller, store) = controller();
        store.set_offline("unreachable");

        let error = controller.select_role(Role::Employee).await.unwrap_err();
        assert_eq!(error.role(), Role::Employee);
        assert!(matches!(error.store_error(), StoreError::Unavailable(_)));
        assert_eq!(controller.role(), Role::None);
        assert_eq!(controller.requested_role(), Role::Employee);
        assert!(controller.initialization_error().is_some());

        store.set_online();
        controller.retry().await.unwrap();
        assert_eq!(controller.role(), Role::Employee);
        assert!(controller.initialization_error().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_leaves_record_untouched() {
        let (mut controller, store) = controller();
        controller.select_role(Role::Employee).await.unwrap();
        store.clear_history();

        controller.shutdown().await;

        assert_eq!(controller.role(), Role::None);
        assert!(controller.consumer().is_none());
        assert!(store.history().is_empty());
    }

    #[tokio::test]
    async fn test_reselecting_same_role_is_noop() {
        let (mut controller, store) = controller();
        controller.select_role(Role::Driver).await.unwrap();
        store.clear_history();

        controller.select_role(Role::Driver).await.unwrap();
        assert!(store.history().is_empty());
    }
}
