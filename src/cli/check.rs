//! Configuration validation command.

use std::path::Path;

use super::output;
use crate::error::Result;
use crate::infrastructure::config::settings::{Config, DEPLOYER_ENV};

/// Validate the configuration file without starting the deployer.
pub fn execute_config(config_path: &Path) -> Result<()> {
    output::section(&format!("Checking {}", config_path.display()));

    let config = Config::load(config_path)?;
    output::success("Configuration file is valid");

    output::field("Deployer", &config.deployer);
    if std::env::var_os(DEPLOYER_ENV).is_some() {
        output::field("", format!("(from {DEPLOYER_ENV})"));
    }
    output::field("State", config.state.path.display());
    output::field("Poll", format!("{}ms", config.state.poll_interval_ms));
    output::field("Services", config.manager.init_dir.display());
    output::field("Data", config.manager.data_dir.display());
    output::field("Agent", config.manager.agent_binary.display());
    output::field(
        "Logging",
        format!("{} ({})", config.logging.level, config.logging.format),
    );

    if !config.manager.agent_binary.exists() {
        output::warning("Agent binary does not exist yet");
    }
    if config.manager.start_command.is_none() {
        output::warning("No start command: service files are written but not started");
    }
    Ok(())
}
