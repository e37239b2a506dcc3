use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::provider::UserRecord;

/// Closed set of account roles. `Admin` is the elevated role that bypasses ownership checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Instructor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Admin => "admin",
        }
    }

    pub fn is_elevated(&self) -> bool {
        match self {
            Role::Admin => true,
            Role::Student | Role::Instructor => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "instructor" => Ok(Role::Instructor),
            "admin" => Ok(Role::Admin),
            other => Err(anyhow::anyhow!("unknown role '{}'", other)),
        }
    }
}

/// Identity attached to a request after its credential has been verified.
/// Built fresh per request; never written back to the user store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: String,
    pub role: Role,
    pub active: bool,
}

impl From<&UserRecord> for Principal {
    fn from(user: &UserRecord) -> Self {
        Self { id: user.id.clone(), role: user.role, active: user.is_active }
    }
}
