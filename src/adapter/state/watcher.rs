//! Change feed over a [`MemoryState`].

use std::collections::BTreeSet;

use async_trait::async_trait;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::Receiver;
use tracing::{debug, warn};

use super::memory::MemoryState;
use crate::domain::UnitName;
use crate::error::FeedError;
use crate::port::ChangeFeed;

/// Reports the units assigned to one deployer.
///
/// The first batch lists every unit currently assigned (possibly none).
/// Later batches carry the de-duplicated names of changed units that are
/// assigned to the deployer, plus units it held until now, so that losing a
/// unit to another deployer or to erasure is reported once.
pub struct UnitsWatcher {
    state: MemoryState,
    deployer: String,
    changes: Option<Receiver<UnitName>>,
    known: BTreeSet<UnitName>,
    initial: Option<Vec<UnitName>>,
    err: Option<FeedError>,
    stopped: bool,
}

impl UnitsWatcher {
    pub(super) fn new(state: MemoryState, deployer: String) -> Self {
        // Subscribe before the initial scan so no change slips between them.
        let changes = state.subscribe();
        let initial = state.units_assigned_to(&deployer);
        Self {
            known: initial.iter().cloned().collect(),
            state,
            deployer,
            changes,
            initial: Some(initial),
            err: None,
            stopped: false,
        }
    }

    /// Every unit worth re-announcing after missed notifications.
    fn rescan(&self) -> BTreeSet<UnitName> {
        let mut names = self.known.clone();
        names.extend(self.state.units_assigned_to(&self.deployer));
        names
    }

    /// Keep the names relevant to this deployer, updating what it knows.
    fn relevant(&mut self, names: BTreeSet<UnitName>) -> Vec<UnitName> {
        let mut batch = Vec::new();
        for name in names {
            match self.state.record(&name) {
                Some(record) if record.deployer.as_deref() == Some(self.deployer.as_str()) => {
                    self.known.insert(name.clone());
                    batch.push(name);
                }
                _ => {
                    if self.known.remove(&name) {
                        batch.push(name);
                    }
                }
            }
        }
        batch
    }

    fn close(&mut self, reason: &str) -> Option<Vec<UnitName>> {
        self.err = Some(FeedError::Upstream(reason.to_string()));
        self.changes = None;
        None
    }
}

#[async_trait]
impl ChangeFeed for UnitsWatcher {
    async fn next_batch(&mut self) -> Option<Vec<UnitName>> {
        if self.stopped || self.err.is_some() {
            return None;
        }
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }

        loop {
            if self.changes.is_none() {
                return self.close("state store closed");
            }
            let changes = self.changes.as_mut()?;

            let mut names = BTreeSet::new();
            match changes.recv().await {
                Ok(name) => {
                    names.insert(name);
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(deployer = %self.deployer, missed, "Units watcher lagged, rescanning");
                    names.extend(self.rescan());
                }
                Err(RecvError::Closed) => return self.close("state store closed"),
            }

            // Coalesce whatever else is already queued into the same batch.
            let mut lagged = false;
            if let Some(changes) = self.changes.as_mut() {
                loop {
                    match changes.try_recv() {
                        Ok(name) => {
                            names.insert(name);
                        }
                        Err(TryRecvError::Lagged(_)) => lagged = true,
                        Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                    }
                }
            }
            if lagged {
                names.extend(self.rescan());
            }

            let batch = self.relevant(names);
            if !batch.is_empty() {
                debug!(deployer = %self.deployer, units = batch.len(), "Units changed");
                return Some(batch);
            }
        }
    }

    fn err(&self) -> Option<FeedError> {
        self.err.clone()
    }

    async fn stop(&mut self) -> Result<(), FeedError> {
        self.stopped = true;
        self.changes = None;
        Ok(())
    }
}
