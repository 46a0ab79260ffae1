//! Role claim carried from the user record into session tokens.
//!
//! A user is either an instructor or a trainee. The role is optional on the
//! user record: accounts created through federated login start without one
//! and are assigned a role elsewhere in the application.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Application role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Runs courses and reviews trainee progress.
    Instructor,
    /// Enrolled in courses.
    Trainee,
}

impl Role {
    /// Returns the stored/serialized form of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instructor => "instructor",
            Self::Trainee => "trainee",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for role text outside the known set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instructor" => Ok(Self::Instructor),
            "trainee" => Ok(Self::Trainee),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_roles() {
        assert_eq!("instructor".parse::<Role>(), Ok(Role::Instructor));
        assert_eq!("trainee".parse::<Role>(), Ok(Role::Trainee));
    }

    #[test]
    fn parsing_is_case_sensitive() {
        assert_eq!(
            "Instructor".parse::<Role>(),
            Err(UnknownRole("Instructor".to_string()))
        );
    }

    #[test]
    fn serialization_format() {
        let json = serde_json::to_string(&Role::Instructor).expect("serialize");
        assert_eq!(json, "\"instructor\"");

        let parsed: Role = serde_json::from_str("\"trainee\"").expect("deserialize");
        assert_eq!(parsed, Role::Trainee);
    }

    #[test]
    fn display_matches_stored_form() {
        assert_eq!(Role::Trainee.to_string(), Role::Trainee.as_str());
    }
}
