//! Request granularity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a request targets individual records or summarized groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// Individual rows, e.g. "list doctors with their phone numbers"
    RecordLevel,
    /// Summaries over groups, e.g. "average salary by department"
    Aggregate,
}

impl Granularity {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::RecordLevel => "record_level",
            Granularity::Aggregate => "aggregate",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Granularity {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "record_level" => Ok(Granularity::RecordLevel),
            "aggregate" => Ok(Granularity::Aggregate),
            _ => Err(crate::Error::parse(format!("Unknown granularity: {}", s))),
        }
    }
}
