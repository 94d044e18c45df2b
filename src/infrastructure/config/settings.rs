//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all deployer settings.
//! Configuration is loaded from a TOML file with an environment variable
//! override for the deployer identity (`BERTH_DEPLOYER`).
//!
//! # Example
//!
//! ```no_run
//! use berth::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("berth.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use super::logging::LoggingConfig;
use super::manager::ManagerConfig;
use super::state::StateConfig;
use crate::error::{ConfigError, Result};

/// Environment variable overriding [`Config::deployer`].
pub const DEPLOYER_ENV: &str = "BERTH_DEPLOYER";

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Identity of this deployer, compared against unit ownership.
    #[serde(default)]
    pub deployer: String,
    pub state: StateConfig,
    pub manager: ManagerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse configuration from TOML content, applying environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML content is malformed or validation fails.
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        Self::parse_toml_with_env(content, |key| std::env::var(key).ok())
    }

    /// Parse configuration, resolving overrides through `env` instead of
    /// the process environment.
    #[allow(clippy::result_large_err)]
    pub fn parse_toml_with_env<F>(content: &str, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;

        if let Some(deployer) = env(DEPLOYER_ENV) {
            if !deployer.trim().is_empty() {
                config.deployer = deployer;
            }
        }

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML content is malformed
    /// - Validation fails
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Validate configuration values.
    #[allow(clippy::result_large_err)]
    fn validate(&self) -> Result<()> {
        if self.deployer.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "deployer" }.into());
        }
        if self.state.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingField { field: "state.path" }.into());
        }
        if self.state.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "state.poll_interval_ms",
                reason: "must be greater than 0".into(),
            }
            .into());
        }

        let dirs = [
            ("manager.init_dir", &self.manager.init_dir),
            ("manager.data_dir", &self.manager.data_dir),
            ("manager.log_dir", &self.manager.log_dir),
            ("manager.agent_binary", &self.manager.agent_binary),
        ];
        for (field, path) in dirs {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::MissingField { field }.into());
            }
        }

        let commands = [
            ("manager.start_command", &self.manager.start_command),
            ("manager.stop_command", &self.manager.stop_command),
        ];
        for (field, command) in commands {
            if let Some(argv) = command {
                if argv.first().map_or(true, |program| program.trim().is_empty()) {
                    return Err(ConfigError::InvalidValue {
                        field,
                        reason: "command must name a program".into(),
                    }
                    .into());
                }
            }
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "logging.format",
                    reason: format!("expected \"pretty\" or \"json\", got {other:?}"),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Initialize logging based on configuration.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const VALID: &str = r#"
deployer = "machine-0"

[state]
path = "/var/lib/berth/state.toml"

[manager]
init_dir = "/etc/systemd/system"
data_dir = "/var/lib/berth"
log_dir = "/var/log/berth"
agent_binary = "/usr/bin/berth-agent"
start_command = ["systemctl", "start", "{service}"]
"#;

    fn parse(content: &str) -> Result<Config> {
        Config::parse_toml_with_env(content, |_| None)
    }

    #[test]
    fn parses_valid_config_with_defaults() {
        let config = parse(VALID).unwrap();
        assert_eq!(config.state.poll_interval_ms, 1000);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
        assert!(config.manager.stop_command.is_none());
    }

    #[test]
    fn env_override_replaces_deployer() {
        let config = Config::parse_toml_with_env(VALID, |key| {
            (key == DEPLOYER_ENV).then(|| "machine-7".to_string())
        })
        .unwrap();
        assert_eq!(config.deployer, "machine-7");
    }

    #[test]
    fn rejects_missing_deployer() {
        let toml = VALID.replace("deployer = \"machine-0\"", "");
        assert!(matches!(
            parse(&toml),
            Err(Error::Config(ConfigError::MissingField { field: "deployer" }))
        ));
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let toml = VALID.replace(
            "path = \"/var/lib/berth/state.toml\"",
            "path = \"/var/lib/berth/state.toml\"\npoll_interval_ms = 0",
        );
        match parse(&toml) {
            Err(Error::Config(ConfigError::InvalidValue { field, .. })) => {
                assert_eq!(field, "state.poll_interval_ms");
            }
            other => panic!("expected invalid poll interval, got {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_command() {
        let toml = VALID.replace(
            "start_command = [\"systemctl\", \"start\", \"{service}\"]",
            "start_command = []",
        );
        assert!(matches!(
            parse(&toml),
            Err(Error::Config(ConfigError::InvalidValue {
                field: "manager.start_command",
                ..
            }))
        ));
    }

    #[test]
    fn rejects_unknown_log_format() {
        let toml = format!("{VALID}\n[logging]\nformat = \"xml\"\n");
        assert!(matches!(
            parse(&toml),
            Err(Error::Config(ConfigError::InvalidValue {
                field: "logging.format",
                ..
            }))
        ));
    }
}
