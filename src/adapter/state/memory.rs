//! In-memory state store.
//!
//! Holds unit records behind a lock and publishes the name of every unit
//! whose life or ownership changes, so that [`UnitsWatcher`]s can turn
//! those notifications into change-feed batches.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::watcher::UnitsWatcher;
use crate::domain::{Credential, Life, ServiceName, Unit, UnitName};
use crate::error::StateError;
use crate::port::UnitState;

/// Capacity of the change notification channel before watchers lag.
pub(super) const CHANGE_BUFFER: usize = 1024;

/// Stored representation of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub name: UnitName,
    #[serde(default)]
    pub life: Life,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}

impl UnitRecord {
    pub fn new(name: UnitName, deployer: Option<&str>) -> Self {
        Self {
            name,
            life: Life::Alive,
            deployer: deployer.map(str::to_string),
            password_hash: None,
        }
    }

    fn snapshot(&self) -> Unit {
        Unit::new(self.name.clone(), self.life, self.deployer.clone())
    }
}

struct Inner {
    units: RwLock<BTreeMap<UnitName, UnitRecord>>,
    changes: Mutex<Option<broadcast::Sender<UnitName>>>,
}

/// Shared in-memory state store. Cloning yields another handle to the
/// same units.
#[derive(Clone)]
pub struct MemoryState {
    inner: Arc<Inner>,
}

impl MemoryState {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            inner: Arc::new(Inner {
                units: RwLock::new(BTreeMap::new()),
                changes: Mutex::new(Some(tx)),
            }),
        }
    }

    /// Create a store pre-populated with `records`.
    pub fn with_units(records: impl IntoIterator<Item = UnitRecord>) -> Self {
        let state = Self::new();
        {
            let mut units = state.inner.units.write();
            for record in records {
                units.insert(record.name.clone(), record);
            }
        }
        state
    }

    /// Add a new Alive unit, optionally assigned to a deployer.
    pub fn add_unit(&self, name: UnitName, deployer: Option<&str>) -> Result<(), StateError> {
        {
            let mut units = self.inner.units.write();
            if units.contains_key(&name) {
                return Err(StateError::Rejected {
                    operation: "add",
                    entity: format!("unit {name}"),
                    reason: "already exists".into(),
                });
            }
            units.insert(name.clone(), UnitRecord::new(name.clone(), deployer));
        }
        self.publish(name);
        Ok(())
    }

    /// Advance a unit's life. Backward transitions are rejected.
    pub fn set_life(&self, name: &UnitName, life: Life) -> Result<(), StateError> {
        let changed = self.update(name, "set life of", |record| {
            if !record.life.can_become(life) {
                return Err(format!("cannot go from {} to {life}", record.life));
            }
            let changed = record.life != life;
            record.life = life;
            Ok(changed)
        })?;
        if changed {
            self.publish(name.clone());
        }
        Ok(())
    }

    /// Assign the unit to a deployer, or unassign it with `None`.
    pub fn assign_deployer(&self, name: &UnitName, deployer: Option<&str>) -> Result<(), StateError> {
        let changed = self.update(name, "assign", |record| {
            let changed = record.deployer.as_deref() != deployer;
            record.deployer = deployer.map(str::to_string);
            Ok(changed)
        })?;
        if changed {
            self.publish(name.clone());
        }
        Ok(())
    }

    /// Copy of the stored record for `name`.
    #[must_use]
    pub fn record(&self, name: &UnitName) -> Option<UnitRecord> {
        self.inner.units.read().get(name).cloned()
    }

    /// All stored records, ordered by unit name.
    #[must_use]
    pub fn records(&self) -> Vec<UnitRecord> {
        self.inner.units.read().values().cloned().collect()
    }

    /// Names of units currently assigned to `deployer`.
    #[must_use]
    pub fn units_assigned_to(&self, deployer: &str) -> Vec<UnitName> {
        self.inner
            .units
            .read()
            .values()
            .filter(|record| record.deployer.as_deref() == Some(deployer))
            .map(|record| record.name.clone())
            .collect()
    }

    /// Replace the whole unit set, returning the names that changed.
    ///
    /// Units missing from `records` are erased. A record asking for a
    /// backward life transition keeps its current life.
    pub fn apply_snapshot(&self, records: impl IntoIterator<Item = UnitRecord>) -> Vec<UnitName> {
        let incoming: BTreeMap<UnitName, UnitRecord> = records
            .into_iter()
            .map(|record| (record.name.clone(), record))
            .collect();
        let mut changed = Vec::new();
        {
            let mut units = self.inner.units.write();
            units.retain(|name, _| {
                let keep = incoming.contains_key(name);
                if !keep {
                    changed.push(name.clone());
                }
                keep
            });
            for (name, mut record) in incoming {
                match units.get(&name) {
                    Some(current) if *current == record => {}
                    Some(current) => {
                        if !current.life.can_become(record.life) {
                            warn!(
                                unit = %name,
                                current = %current.life,
                                requested = %record.life,
                                "Ignoring backward life transition"
                            );
                            record.life = current.life;
                        }
                        if *current != record {
                            units.insert(name.clone(), record);
                            changed.push(name);
                        }
                    }
                    None => {
                        units.insert(name.clone(), record);
                        changed.push(name);
                    }
                }
            }
        }
        for name in &changed {
            self.publish(name.clone());
        }
        changed
    }

    /// Watch the units assigned to `deployer`.
    pub fn watch_units(&self, deployer: impl Into<String>) -> UnitsWatcher {
        UnitsWatcher::new(self.clone(), deployer.into())
    }

    /// Stop publishing changes. Open watchers close with an error.
    pub fn close(&self) {
        self.inner.changes.lock().take();
    }

    pub(super) fn subscribe(&self) -> Option<broadcast::Receiver<UnitName>> {
        self.inner.changes.lock().as_ref().map(broadcast::Sender::subscribe)
    }

    fn publish(&self, name: UnitName) {
        if let Some(tx) = self.inner.changes.lock().as_ref() {
            // No receivers is fine: nobody is watching yet.
            let _ = tx.send(name);
        }
    }

    fn update<F>(&self, name: &UnitName, operation: &'static str, f: F) -> Result<bool, StateError>
    where
        F: FnOnce(&mut UnitRecord) -> Result<bool, String>,
    {
        let mut units = self.inner.units.write();
        let record = units
            .get_mut(name)
            .ok_or_else(|| StateError::not_found(format!("unit {name}")))?;
        f(record).map_err(|reason| StateError::Rejected {
            operation,
            entity: format!("unit {name}"),
            reason,
        })
    }
}

impl Default for MemoryState {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UnitState for MemoryState {
    async fn unit(&self, name: &UnitName) -> Result<Unit, StateError> {
        self.inner
            .units
            .read()
            .get(name)
            .map(UnitRecord::snapshot)
            .ok_or_else(|| StateError::not_found(format!("unit {name}")))
    }

    async fn set_password(
        &self,
        name: &UnitName,
        credential: &Credential,
    ) -> Result<(), StateError> {
        let digest = credential.digest();
        self.update(name, "set password of", |record| {
            record.password_hash = Some(digest);
            Ok(false)
        })?;
        debug!(unit = %name, "Password set");
        Ok(())
    }

    async fn ensure_dead(&self, name: &UnitName) -> Result<(), StateError> {
        self.set_life(name, Life::Dead)
    }

    async fn remove_unit(&self, service: &ServiceName, name: &UnitName) -> Result<(), StateError> {
        let rejected = |reason: String| StateError::Rejected {
            operation: "remove",
            entity: format!("unit {name}"),
            reason,
        };
        if name.service() != *service {
            return Err(rejected(format!("unit does not belong to service {service}")));
        }
        {
            let mut units = self.inner.units.write();
            match units.get(name) {
                // Already erased by someone else.
                None => return Ok(()),
                Some(record) if record.life != Life::Dead => {
                    return Err(rejected(format!("unit is {}", record.life)));
                }
                Some(_) => {
                    units.remove(name);
                }
            }
        }
        self.publish(name.clone());
        Ok(())
    }
}
