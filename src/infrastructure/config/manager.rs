//! Deployment manager configuration.

use std::path::PathBuf;

use serde::Deserialize;

/// Placeholder substituted with the service file name in start/stop commands.
pub const SERVICE_PLACEHOLDER: &str = "{service}";

/// Settings for the filesystem deployment manager.
#[derive(Debug, Clone, Deserialize)]
pub struct ManagerConfig {
    /// Directory receiving one service file per deployed unit.
    pub init_dir: PathBuf,
    /// Root of the per-unit agent directories.
    pub data_dir: PathBuf,
    /// Directory for agent log files.
    pub log_dir: PathBuf,
    /// Binary started for every unit agent.
    pub agent_binary: PathBuf,
    /// Command run after a service file is written, e.g.
    /// `["systemctl", "start", "{service}"]`.
    #[serde(default)]
    pub start_command: Option<Vec<String>>,
    /// Command run before a service file is removed.
    #[serde(default)]
    pub stop_command: Option<Vec<String>>,
}
