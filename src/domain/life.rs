//! Unit life-cycle stages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Monotonic life-cycle stage of a unit.
///
/// A unit only ever moves forward: `Alive` precedes `Dying` or `Dead`,
/// `Dying` precedes `Dead`, and `Dead` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Life {
    #[default]
    Alive,
    Dying,
    Dead,
}

impl Life {
    /// Whether a unit at this stage may move to `next`.
    ///
    /// Staying at the same stage is allowed.
    #[must_use]
    pub fn can_become(self, next: Life) -> bool {
        next >= self
    }

    /// Lowercase name of this stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Life::Alive => "alive",
            Life::Dying => "dying",
            Life::Dead => "dead",
        }
    }
}

impl fmt::Display for Life {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Life {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alive" => Ok(Life::Alive),
            "dying" => Ok(Life::Dying),
            "dead" => Ok(Life::Dead),
            other => Err(DomainError::InvalidLife {
                value: other.to_string(),
            }),
        }
    }
}
