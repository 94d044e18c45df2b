//! The per-unit reconciliation step.
//!
//! A [`Reconciler`] owns the deployer's record of which units it has
//! deployed and decides, one unit at a time, whether that unit should be
//! deployed, recalled, or removed from state.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{Life, Unit, UnitName};
use crate::error::{DeployerError, InvariantViolation};
use crate::port::{CredentialSource, Manager, RandomCredentials, UnitState};

/// What a reconciliation step did to a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Already converged.
    Unchanged,
    Deployed,
    Recalled,
    /// Marked Dead and erased without ever being deployed.
    Removed,
    /// Recalled because it died, then erased.
    RecalledAndRemoved,
}

/// Reconciles units against the deployer's local record of deployed units.
pub struct Reconciler {
    deployer_name: String,
    state: Arc<dyn UnitState>,
    manager: Arc<dyn Manager>,
    credentials: Arc<dyn CredentialSource>,
    deployed: BTreeSet<UnitName>,
}

impl Reconciler {
    pub fn new(
        deployer_name: impl Into<String>,
        state: Arc<dyn UnitState>,
        manager: Arc<dyn Manager>,
    ) -> Self {
        Self {
            deployer_name: deployer_name.into(),
            state,
            manager,
            credentials: Arc::new(RandomCredentials),
            deployed: BTreeSet::new(),
        }
    }

    /// Replace the credential source used for new deployments.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialSource>) -> Self {
        self.credentials = credentials;
        self
    }

    #[must_use]
    pub fn deployer_name(&self) -> &str {
        &self.deployer_name
    }

    #[must_use]
    pub fn is_deployed(&self, unit: &UnitName) -> bool {
        self.deployed.contains(unit)
    }

    /// Units this deployer believes it has deployed, in name order.
    #[must_use]
    pub fn deployed(&self) -> Vec<UnitName> {
        self.deployed.iter().cloned().collect()
    }

    /// Adopt the units the manager already runs, then reconcile each.
    ///
    /// Corrects anything that went stale while no deployer was running.
    pub async fn seed(&mut self) -> Result<(), DeployerError> {
        let units = self.manager.deployed_units().await?;
        info!(
            manager = self.manager.manager_name(),
            count = units.len(),
            "Adopting deployed units"
        );
        for unit in units {
            self.deployed.insert(unit.clone());
            self.reconcile(&unit).await?;
        }
        Ok(())
    }

    /// Ensure `name` is deployed, recalled, or removed, as its state indicates.
    pub async fn reconcile(&mut self, name: &UnitName) -> Result<Action, DeployerError> {
        debug!(unit = %name, "Checking unit");

        // An erased unit is as good as Dead and owned by nobody.
        let unit = match self.state.unit(name).await {
            Ok(unit) => Some(unit),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };
        let life = unit.as_ref().map_or(Life::Dead, Unit::life);
        let responsible = unit
            .as_ref()
            .is_some_and(|unit| unit.is_assigned_to(&self.deployer_name));

        // Deployed units must go if they are Dead or no longer ours.
        let mut recalled = false;
        if self.deployed.contains(name) && (life == Life::Dead || !responsible) {
            self.recall(name).await?;
            recalled = true;
        }

        // Only Alive units we are responsible for get deployed. A Dying unit
        // that was never deployed is removed straight away rather than
        // started just so that it can stop itself.
        if let Some(unit) = unit.filter(|_| responsible && !self.deployed.contains(name)) {
            if life == Life::Alive {
                self.deploy(&unit).await?;
                return Ok(Action::Deployed);
            }
            self.remove(&unit).await?;
            return Ok(if recalled {
                Action::RecalledAndRemoved
            } else {
                Action::Removed
            });
        }

        Ok(if recalled {
            Action::Recalled
        } else {
            Action::Unchanged
        })
    }

    async fn deploy(&mut self, unit: &Unit) -> Result<(), DeployerError> {
        let name = unit.name();
        if self.deployed.contains(name) {
            return Err(InvariantViolation::DoubleDeploy(name.clone()).into());
        }
        info!(unit = %name, action = "deploy", "Deploying unit");
        let credential = self.credentials.generate()?;
        self.state.set_password(name, &credential).await?;
        self.manager.deploy(name, &credential).await?;
        self.deployed.insert(name.clone());
        Ok(())
    }

    async fn recall(&mut self, name: &UnitName) -> Result<(), DeployerError> {
        if !self.deployed.contains(name) {
            return Err(InvariantViolation::RecallUndeployed(name.clone()).into());
        }
        info!(unit = %name, action = "recall", "Recalling unit");
        self.manager.recall(name).await?;
        self.deployed.remove(name);
        Ok(())
    }

    async fn remove(&mut self, unit: &Unit) -> Result<(), DeployerError> {
        let name = unit.name();
        if self.deployed.contains(name) {
            return Err(InvariantViolation::RemoveDeployed(name.clone()).into());
        }
        if unit.life() == Life::Alive {
            return Err(InvariantViolation::RemoveAlive(name.clone()).into());
        }
        info!(unit = %name, action = "remove", "Removing unit");
        self.state.ensure_dead(name).await?;
        self.state.remove_unit(&unit.service(), name).await?;
        Ok(())
    }
}
