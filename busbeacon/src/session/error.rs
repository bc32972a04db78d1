//! Session errors.

use thiserror::Error;

use super::role::Role;
use crate::store::StoreError;

/// Errors raised while entering a role.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The store could not be reached while setting up `role`.
    ///
    /// The session stays usable: select a role again or retry.
    #[error("Could not start the {role} session: {source}")]
    Initialization {
        role: Role,
        #[source]
        source: StoreError,
    },
}

impl SessionError {
    /// The role whose setup failed.
    pub fn role(&self) -> Role {
        match self {
            SessionError::Initialization { role, .. } => *role,
        }
    }

    /// Underlying store failure.
    pub fn store_error(&self) -> &StoreError {
        match self {
            SessionError::Initialization { source, .. } => source,
        }
    }
}
