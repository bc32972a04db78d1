//! Session controller: role selection and shared-record hygiene.

mod controller;
mod error;
mod role;

pub use controller::{SessionConfig, SessionController};
pub use error::SessionError;
pub use role::Role;
