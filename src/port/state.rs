//! State port: the cluster state store as seen by a deployer.
//!
//! The deployer only ever reads unit snapshots and performs the handful of
//! mutations it is entitled to: setting the initial credential, marking a
//! unit Dead, and erasing it through its service.

use async_trait::async_trait;

use crate::domain::{Credential, ServiceName, Unit, UnitName};
use crate::error::StateError;

/// Entity lookup and life-cycle mutation on the cluster state store.
///
/// # Implementation Notes
///
/// - Implementations must be thread-safe (`Send + Sync`)
/// - `unit` must return [`StateError::NotFound`] for units that have been
///   erased; any other error is treated as an operational failure
#[async_trait]
pub trait UnitState: Send + Sync {
    /// Resolve a unit snapshot by name.
    async fn unit(&self, name: &UnitName) -> Result<Unit, StateError>;

    /// Store the agent credential against the unit.
    async fn set_password(&self, name: &UnitName, credential: &Credential)
        -> Result<(), StateError>;

    /// Mark the unit Dead. Succeeds if it already is.
    async fn ensure_dead(&self, name: &UnitName) -> Result<(), StateError>;

    /// Erase a Dead unit from its service.
    async fn remove_unit(&self, service: &ServiceName, name: &UnitName)
        -> Result<(), StateError>;
}
