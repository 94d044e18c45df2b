//! Unit snapshots as read from the state collaborator.

use serde::{Deserialize, Serialize};

use super::id::{ServiceName, UnitName};
use super::life::Life;

/// A point-in-time view of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    name: UnitName,
    life: Life,
    deployer: Option<String>,
}

impl Unit {
    pub fn new(name: UnitName, life: Life, deployer: Option<String>) -> Self {
        Self {
            name,
            life,
            deployer,
        }
    }

    #[must_use]
    pub fn name(&self) -> &UnitName {
        &self.name
    }

    #[must_use]
    pub fn life(&self) -> Life {
        self.life
    }

    /// Name of the deployer responsible for this unit, if any.
    #[must_use]
    pub fn deployer_name(&self) -> Option<&str> {
        self.deployer.as_deref()
    }

    /// The parent entity the unit must be removed through.
    #[must_use]
    pub fn service(&self) -> ServiceName {
        self.name.service()
    }

    /// Whether the deployer named `deployer` is responsible for this unit.
    #[must_use]
    pub fn is_assigned_to(&self, deployer: &str) -> bool {
        self.deployer.as_deref() == Some(deployer)
    }
}
