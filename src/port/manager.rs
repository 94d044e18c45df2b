//! Deployment manager port.
//!
//! Where a deployer decides *what* should run, a [`Manager`] decides *how*
//! a unit agent is started and stopped.

use async_trait::async_trait;

use crate::domain::{Credential, UnitName};
use crate::error::ManagerError;

/// A unit agent deployment strategy.
///
/// The deployer never relies on idempotence here: it tracks what it has
/// deployed itself and never issues a duplicate call.
#[async_trait]
pub trait Manager: Send + Sync {
    /// Start the agent for `unit` and keep it running until recalled.
    ///
    /// Returns an error if the agent is already deployed.
    async fn deploy(&self, unit: &UnitName, credential: &Credential) -> Result<(), ManagerError>;

    /// Stop the agent for `unit` and destroy its local data.
    ///
    /// Returns an error if the agent was not deployed by this manager.
    async fn recall(&self, unit: &UnitName) -> Result<(), ManagerError>;

    /// Names of all units currently deployed by this manager.
    async fn deployed_units(&self) -> Result<Vec<UnitName>, ManagerError>;

    /// Manager name for logging/debugging.
    fn manager_name(&self) -> &'static str;
}
