//! In-memory [`Manager`] that records what the deployer asks of it.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};

use crate::domain::{Credential, UnitName};
use crate::error::ManagerError;
use crate::port::Manager;

/// A deploy or recall issued to a [`RecordingManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerCall {
    Deploy(UnitName),
    Recall(UnitName),
}

#[derive(Default)]
struct Inner {
    deployed: BTreeMap<UnitName, Option<Credential>>,
    calls: Vec<ManagerCall>,
    deploy_failures: VecDeque<String>,
    recall_failures: VecDeque<String>,
    list_failure: Option<String>,
}

/// Tracks deployed units in memory and logs every deploy and recall,
/// including the ones it was told to fail.
///
/// Like a real manager it refuses to deploy twice or recall what it never
/// deployed.
#[derive(Default)]
pub struct RecordingManager {
    inner: Mutex<Inner>,
    gate: Mutex<Option<Arc<Gate>>>,
}

impl RecordingManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start out with `units` already deployed, as after a restart.
    pub fn with_deployed(units: impl IntoIterator<Item = UnitName>) -> Self {
        let manager = Self::new();
        manager
            .inner
            .lock()
            .deployed
            .extend(units.into_iter().map(|unit| (unit, None)));
        manager
    }

    /// Fail the next deploy with `reason`.
    pub fn fail_next_deploy(&self, reason: impl Into<String>) {
        self.inner.lock().deploy_failures.push_back(reason.into());
    }

    /// Fail the next recall with `reason`.
    pub fn fail_next_recall(&self, reason: impl Into<String>) {
        self.inner.lock().recall_failures.push_back(reason.into());
    }

    /// Fail every `deployed_units` call with `reason`.
    pub fn fail_listing(&self, reason: impl Into<String>) {
        self.inner.lock().list_failure = Some(reason.into());
    }

    /// Hold every subsequent deploy until released through the returned gate.
    pub fn gate_deploys(&self) -> DeployGate {
        let gate = Arc::new(Gate {
            entered: Notify::new(),
            permits: Semaphore::new(0),
        });
        *self.gate.lock() = Some(Arc::clone(&gate));
        DeployGate(gate)
    }

    /// Every deploy and recall so far, in order.
    pub fn calls(&self) -> Vec<ManagerCall> {
        self.inner.lock().calls.clone()
    }

    /// Units currently deployed, in name order.
    pub fn deployed(&self) -> Vec<UnitName> {
        self.inner.lock().deployed.keys().cloned().collect()
    }

    /// The credential `unit` was deployed with, if this manager deployed it.
    pub fn credential_for(&self, unit: &UnitName) -> Option<Credential> {
        self.inner.lock().deployed.get(unit).cloned().flatten()
    }
}

#[async_trait]
impl Manager for RecordingManager {
    async fn deploy(&self, unit: &UnitName, credential: &Credential) -> Result<(), ManagerError> {
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            if let Ok(permit) = gate.permits.acquire().await {
                permit.forget();
            }
        }

        let mut inner = self.inner.lock();
        inner.calls.push(ManagerCall::Deploy(unit.clone()));
        if let Some(reason) = inner.deploy_failures.pop_front() {
            return Err(ManagerError::Other(reason));
        }
        if inner.deployed.contains_key(unit) {
            return Err(ManagerError::AlreadyDeployed { unit: unit.clone() });
        }
        inner.deployed.insert(unit.clone(), Some(credential.clone()));
        Ok(())
    }

    async fn recall(&self, unit: &UnitName) -> Result<(), ManagerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(ManagerCall::Recall(unit.clone()));
        if let Some(reason) = inner.recall_failures.pop_front() {
            return Err(ManagerError::Other(reason));
        }
        if inner.deployed.remove(unit).is_none() {
            return Err(ManagerError::NotDeployed { unit: unit.clone() });
        }
        Ok(())
    }

    async fn deployed_units(&self) -> Result<Vec<UnitName>, ManagerError> {
        let inner = self.inner.lock();
        if let Some(reason) = &inner.list_failure {
            return Err(ManagerError::Other(reason.clone()));
        }
        Ok(inner.deployed.keys().cloned().collect())
    }

    fn manager_name(&self) -> &'static str {
        "recording"
    }
}

struct Gate {
    entered: Notify,
    permits: Semaphore,
}

/// Control side of [`RecordingManager::gate_deploys`].
pub struct DeployGate(Arc<Gate>);

impl DeployGate {
    /// Wait until a deploy is being held.
    pub async fn entered(&self) {
        self.0.entered.notified().await;
    }

    /// Let one held deploy proceed.
    pub fn release(&self) {
        self.0.permits.add_permits(1);
    }
}
