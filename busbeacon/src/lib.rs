//! busbeacon - live bus position sharing
//!
//! A driver (or an on-board collaborator) shares the bus position through a
//! single shared record; staff follow it in near real time.
//!
//! - [`record`]: the shared `BusRecord` document and partial patches
//! - [`store`]: store adapter (REST and in-memory backends, push/poll feeds)
//! - [`producer`]: position providers and the location sharing state machine
//! - [`consumer`]: following the record and deriving what to display
//! - [`session`]: role selection keeping the record consistent
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use busbeacon::producer::ChannelProvider;
//! use busbeacon::session::{Role, SessionConfig, SessionController};
//! use busbeacon::store::MemoryStore;
//! use busbeacon::time::system_clock;
//!
//! # async fn run() -> Result<(), busbeacon::session::SessionError> {
//! let store = Arc::new(MemoryStore::new());
//! let provider = Arc::new(ChannelProvider::new());
//! let mut session = SessionController::new(store, provider, SessionConfig::default(), system_clock());
//!
//! session.initialize().await?;
//! session.select_role(Role::Driver).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod consumer;
pub mod logging;
pub mod producer;
pub mod record;
pub mod session;
pub mod store;
pub mod time;

/// Version of the busbeacon library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
