use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Group name granting visibility over every department.
pub const UNIVERSAL_MEMBERSHIP: &str = "ALL";

/// Departments that evaluate applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Department {
    Law,
    It,
    Lia,
    Fin,
    Pr,
    Hr,
    Cm,
    Tut,
    Pre,
}

impl Department {
    pub const fn ordered() -> [Self; 9] {
        [
            Self::Law,
            Self::It,
            Self::Lia,
            Self::Fin,
            Self::Pr,
            Self::Hr,
            Self::Cm,
            Self::Tut,
            Self::Pre,
        ]
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::Law => "LAW",
            Self::It => "IT",
            Self::Lia => "LIA",
            Self::Fin => "FIN",
            Self::Pr => "PR",
            Self::Hr => "HR",
            Self::Cm => "CM",
            Self::Tut => "TUT",
            Self::Pre => "PRE",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Law => "Legal Affairs",
            Self::It => "Information Technology",
            Self::Lia => "External Liaison",
            Self::Fin => "Finance",
            Self::Pr => "Publicity",
            Self::Hr => "Human Resources",
            Self::Cm => "Industry Research",
            Self::Tut => "Teaching",
            Self::Pre => "Presidium",
        }
    }

    /// Departments whose group membership grants visibility. `PRE` handles records but its
    /// group carries no scope of its own.
    pub const fn scoping() -> [Self; 8] {
        [
            Self::Law,
            Self::It,
            Self::Lia,
            Self::Fin,
            Self::Pr,
            Self::Hr,
            Self::Cm,
            Self::Tut,
        ]
    }

    /// Case-sensitive lookup by wire code. `ALL` is not a department.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ordered()
            .into_iter()
            .find(|department| department.code() == code)
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown department code '{0}'")]
pub struct UnknownDepartment(pub String);

impl FromStr for Department {
    type Err = UnknownDepartment;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_code(value.trim()).ok_or_else(|| UnknownDepartment(value.to_string()))
    }
}

/// Registry entry exposed to API clients.
#[derive(Debug, Clone, Serialize)]
pub struct DepartmentEntry {
    pub code: &'static str,
    pub display_name: &'static str,
}

pub fn registry() -> Vec<DepartmentEntry> {
    Department::ordered()
        .into_iter()
        .map(|department| DepartmentEntry {
            code: department.code(),
            display_name: department.display_name(),
        })
        .collect()
}
