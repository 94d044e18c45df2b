//! File-backed state store.
//!
//! The state document is a TOML file of `[[units]]` tables. It is loaded
//! into a [`MemoryState`]; mutations made through [`UnitState`] are written
//! back atomically, and external edits are picked up by [`FileState::refresh`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::memory::{MemoryState, UnitRecord};
use super::watcher::UnitsWatcher;
use crate::domain::{Credential, ServiceName, Unit, UnitName};
use crate::error::StateError;
use crate::port::UnitState;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateDocument {
    #[serde(default)]
    units: Vec<UnitRecord>,
}

/// A [`MemoryState`] persisted to a TOML document.
pub struct FileState {
    path: PathBuf,
    inner: MemoryState,
    /// Last content read from or written to `path`.
    last_seen: Mutex<Option<String>>,
    /// Held across every read-apply and mutate-persist of the document, so a
    /// read older than the last write is never applied.
    io: AsyncMutex<()>,
}

impl FileState {
    /// Open the state document at `path`. A missing file is an empty state.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();
        let (records, content) = match std::fs::read_to_string(&path) {
            Ok(content) => (parse(&path, &content)?, Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (Vec::new(), None),
            Err(e) => {
                return Err(StateError::Unavailable(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };
        info!(path = %path.display(), units = records.len(), "State loaded");
        Ok(Self {
            path,
            inner: MemoryState::with_units(records),
            last_seen: Mutex::new(content),
            io: AsyncMutex::new(()),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The in-memory view of the document.
    #[must_use]
    pub fn memory(&self) -> &MemoryState {
        &self.inner
    }

    /// Watch the units assigned to `deployer`.
    pub fn watch_units(&self, deployer: impl Into<String>) -> UnitsWatcher {
        self.inner.watch_units(deployer)
    }

    /// Re-read the document and apply external edits.
    ///
    /// Returns the names of units that changed.
    pub async fn refresh(&self) -> Result<Vec<UnitName>, StateError> {
        let _io = self.io.lock().await;
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(StateError::Unavailable(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )))
            }
        };
        if self.last_seen.lock().as_deref() == Some(content.as_str()) {
            return Ok(Vec::new());
        }

        let records = parse(&self.path, &content)?;
        *self.last_seen.lock() = Some(content);
        let changed = self.inner.apply_snapshot(records);
        if !changed.is_empty() {
            debug!(units = changed.len(), "State document changed");
        }
        Ok(changed)
    }

    /// Refresh every `interval` until `shutdown` turns true.
    pub async fn poll(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh().await {
                        warn!(path = %self.path.display(), error = %e, "State refresh failed");
                    }
                }
            }
        }
        debug!("State polling stopped");
    }

    /// Write the current state back to the document. Callers hold `io`.
    async fn persist(&self) -> Result<(), StateError> {
        let document = StateDocument {
            units: self.inner.records(),
        };
        let content =
            toml::to_string(&document).map_err(|e| StateError::Persist(e.to_string()))?;

        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state.toml".to_string());
        let tmp = self.path.with_file_name(format!(".{file_name}.tmp"));
        let persist_err =
            |e: std::io::Error| StateError::Persist(format!("{}: {e}", self.path.display()));

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(persist_err)?;
        }
        tokio::fs::write(&tmp, &content).await.map_err(persist_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(persist_err)?;

        *self.last_seen.lock() = Some(content);
        Ok(())
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stopped| *stopped).await;
}

fn parse(path: &Path, content: &str) -> Result<Vec<UnitRecord>, StateError> {
    toml::from_str::<StateDocument>(content)
        .map(|document| document.units)
        .map_err(|e| StateError::Unavailable(format!("cannot parse {}: {e}", path.display())))
}

#[async_trait]
impl UnitState for FileState {
    async fn unit(&self, name: &UnitName) -> Result<Unit, StateError> {
        self.inner.unit(name).await
    }

    async fn set_password(
        &self,
        name: &UnitName,
        credential: &Credential,
    ) -> Result<(), StateError> {
        let _io = self.io.lock().await;
        self.inner.set_password(name, credential).await?;
        self.persist().await
    }

    async fn ensure_dead(&self, name: &UnitName) -> Result<(), StateError> {
        let _io = self.io.lock().await;
        self.inner.ensure_dead(name).await?;
        self.persist().await
    }

    async fn remove_unit(&self, service: &ServiceName, name: &UnitName) -> Result<(), StateError> {
        let _io = self.io.lock().await;
        self.inner.remove_unit(service, name).await?;
        self.persist().await
    }
}
