//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (init, path, show)
//! - [`drive`] - Share this device's position (driver or collaborator)
//! - [`reset`] - Reset the shared record to its baseline
//! - [`verify`] - Check that the configured database is reachable
//! - [`watch`] - Follow the live position (employee)

pub mod common;
pub mod config;
pub mod drive;
pub mod reset;
pub mod verify;
pub mod watch;
