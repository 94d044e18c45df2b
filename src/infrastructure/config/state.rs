//! State store configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Where the file-backed state store lives and how often it is re-read.
#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    pub path: PathBuf,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl StateConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}
