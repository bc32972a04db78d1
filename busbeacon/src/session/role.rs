//! Session roles.

use std::fmt;
use std::str::FromStr;

/// Who the local user is acting as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    /// No role selected; the record is held at baseline.
    #[default]
    None,
    /// Bus driver sharing the live position.
    Driver,
    /// Collaborator on board sharing on the driver's behalf.
    Collaborator,
    /// Staff member following the bus.
    Employee,
}

impl Role {
    /// True for roles that write the shared record.
    pub fn is_producer(self) -> bool {
        matches!(self, Role::Driver | Role::Collaborator)
    }

    /// True for the read-only role.
    pub fn is_consumer(self) -> bool {
        self == Role::Employee
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::None => "none",
            Role::Driver => "driver",
            Role::Collaborator => "collaborator",
            Role::Employee => "employee",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Role::None),
            "driver" => Ok(Role::Driver),
            "collaborator" => Ok(Role::Collaborator),
            "employee" => Ok(Role::Employee),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_kinds() {
        assert!(Role::Driver.is_producer());
        assert!(Role::Collaborator.is_producer());
        assert!(!Role::Employee.is_producer());
        assert!(Role::Employee.is_consumer());
        assert!(!Role::None.is_producer() && !Role::None.is_consumer());
    }

    #[test]
    fn test_role_parse_and_display() {
        for role in [Role::None, Role::Driver, Role::Collaborator, Role::Employee] {
            assert_eq!(role.to_string().parse::<Role>(), Ok(role));
        }
        assert!("passenger".parse::<Role>().is_err());
    }
}
