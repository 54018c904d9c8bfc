//! Shared severity scale for threads, groups and advisories.
//!
//! Levels are ordered by ascending severity and compared by ordinal:
//!
//! ```text
//! IGNORE < NORMAL < UNKNOWN < WATCH < WARNING < FATAL
//! ```
//!
//! A container (group) is never healthier than its worst member, so
//! aggregation is always a `max` over member levels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered health classification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthLevel {
    /// Not worth showing (idle pool threads, pollers).
    Ignore,
    /// Nothing suspicious.
    #[default]
    Normal,
    /// Busy but unexplained by any advisory.
    Unknown,
    /// Worth a second look.
    Watch,
    /// Likely contributes to a problem.
    Warning,
    /// Needs immediate attention.
    Fatal,
}

impl HealthLevel {
    /// Every level in ascending order.
    pub const ALL: [Self; 6] = [
        Self::Ignore,
        Self::Normal,
        Self::Unknown,
        Self::Watch,
        Self::Warning,
        Self::Fatal,
    ];

    /// Position on the scale (IGNORE = 0).
    #[must_use]
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Canonical upper-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ignore => "IGNORE",
            Self::Normal => "NORMAL",
            Self::Unknown => "UNKNOWN",
            Self::Watch => "WATCH",
            Self::Warning => "WARNING",
            Self::Fatal => "FATAL",
        }
    }

    /// Worst of an iterator of levels, `None` when empty.
    pub fn max_of<I: IntoIterator<Item = Self>>(levels: I) -> Option<Self> {
        levels.into_iter().max()
    }
}

impl fmt::Display for HealthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a health name is not on the scale.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "unknown health level: {0}. Expected one of: IGNORE, NORMAL, UNKNOWN, WATCH, WARNING, FATAL"
)]
pub struct ParseHealthError(pub String);

impl FromStr for HealthLevel {
    type Err = ParseHealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IGNORE" => Ok(Self::Ignore),
            "NORMAL" => Ok(Self::Normal),
            "UNKNOWN" => Ok(Self::Unknown),
            "WATCH" => Ok(Self::Watch),
            "WARNING" | "WARN" => Ok(Self::Warning),
            "FATAL" => Ok(Self::Fatal),
            _ => Err(ParseHealthError(s.to_string())),
        }
    }
}
