//! Filesystem deployment manager.
//!
//! Every deployed unit gets an agent directory holding its configuration
//! and credential, plus a systemd-style service file in the init
//! directory. The service files are the record of what is deployed:
//! [`Manager::deployed_units`] lists them.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::domain::{Credential, UnitName};
use crate::error::ManagerError;
use crate::infrastructure::config::manager::{ManagerConfig, SERVICE_PLACEHOLDER};
use crate::port::Manager;

const SERVICE_PREFIX: &str = "berth-";
const SERVICE_SUFFIX: &str = ".service";
const AGENT_CONF: &str = "agent.toml";

/// Contents of an agent's `agent.toml`.
#[derive(Debug, Serialize)]
struct AgentConf<'a> {
    unit: &'a str,
    state_path: &'a Path,
    credential: &'a str,
    deployed_at: DateTime<Utc>,
}

/// Deploys unit agents as service files plus agent directories.
#[derive(Debug, Clone)]
pub struct SimpleManager {
    config: ManagerConfig,
    state_path: PathBuf,
}

impl SimpleManager {
    /// Create a manager whose agents will connect to the state at `state_path`.
    pub fn new(config: ManagerConfig, state_path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            state_path: state_path.into(),
        }
    }

    /// Service file name for `unit`, e.g. `berth-unit-app-0.service`.
    #[must_use]
    pub fn service_name(unit: &UnitName) -> String {
        format!("{SERVICE_PREFIX}{}{SERVICE_SUFFIX}", unit.tag())
    }

    #[must_use]
    pub fn service_path(&self, unit: &UnitName) -> PathBuf {
        self.config.init_dir.join(Self::service_name(unit))
    }

    #[must_use]
    pub fn agent_dir(&self, unit: &UnitName) -> PathBuf {
        self.config.data_dir.join("agents").join(unit.tag())
    }

    fn log_path(&self, unit: &UnitName) -> PathBuf {
        self.config.log_dir.join(format!("{}.log", unit.tag()))
    }

    /// Generate the service file content.
    fn service_file(&self, unit: &UnitName) -> String {
        let log = self.log_path(unit);
        format!(
            r#"[Unit]
Description=berth agent for unit {unit}
After=network-online.target
Wants=network-online.target

[Service]
Type=simple
ExecStart={binary} --unit {unit} --config {conf}
Restart=on-failure
RestartSec=5
StandardOutput=append:{log}
StandardError=append:{log}

[Install]
WantedBy=multi-user.target
"#,
            binary = self.config.agent_binary.display(),
            conf = self.agent_dir(unit).join(AGENT_CONF).display(),
            log = log.display(),
        )
    }

    async fn write_agent(&self, unit: &UnitName, credential: &Credential) -> Result<(), ManagerError> {
        let agent_dir = self.agent_dir(unit);
        create_dir(&agent_dir).await?;
        create_dir(&self.config.log_dir).await?;

        let conf = AgentConf {
            unit: unit.as_str(),
            state_path: &self.state_path,
            credential: credential.expose(),
            deployed_at: Utc::now(),
        };
        let content = toml::to_string(&conf)
            .map_err(|e| ManagerError::Other(format!("cannot encode agent config: {e}")))?;
        let conf_path = agent_dir.join(AGENT_CONF);
        tokio::fs::write(&conf_path, content)
            .await
            .map_err(|e| ManagerError::io(format!("cannot write {}", conf_path.display()), e))?;
        restrict_permissions(&conf_path).await?;

        create_dir(&self.config.init_dir).await?;
        let service_path = self.service_path(unit);
        tokio::fs::write(&service_path, self.service_file(unit))
            .await
            .map_err(|e| ManagerError::io(format!("cannot write {}", service_path.display()), e))?;

        run_hook(self.config.start_command.as_deref(), unit).await
    }

    /// Remove whatever `deploy` may have written for `unit`.
    async fn remove_agent(&self, unit: &UnitName) -> Result<(), ManagerError> {
        let service_path = self.service_path(unit);
        match tokio::fs::remove_file(&service_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ManagerError::io(
                    format!("cannot remove {}", service_path.display()),
                    e,
                ))
            }
        }

        let agent_dir = self.agent_dir(unit);
        match tokio::fs::remove_dir_all(&agent_dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ManagerError::io(
                format!("cannot remove {}", agent_dir.display()),
                e,
            )),
        }
    }

    async fn is_deployed(&self, unit: &UnitName) -> Result<bool, ManagerError> {
        let service_path = self.service_path(unit);
        tokio::fs::try_exists(&service_path)
            .await
            .map_err(|e| ManagerError::io(format!("cannot stat {}", service_path.display()), e))
    }
}

#[async_trait]
impl Manager for SimpleManager {
    async fn deploy(&self, unit: &UnitName, credential: &Credential) -> Result<(), ManagerError> {
        if self.is_deployed(unit).await? {
            return Err(ManagerError::AlreadyDeployed { unit: unit.clone() });
        }

        if let Err(e) = self.write_agent(unit, credential).await {
            if let Err(cleanup) = self.remove_agent(unit).await {
                warn!(unit = %unit, error = %cleanup, "Cleanup after failed deploy failed");
            }
            return Err(e);
        }

        info!(unit = %unit, service = %Self::service_name(unit), "Agent deployed");
        Ok(())
    }

    async fn recall(&self, unit: &UnitName) -> Result<(), ManagerError> {
        if !self.is_deployed(unit).await? {
            return Err(ManagerError::NotDeployed { unit: unit.clone() });
        }

        run_hook(self.config.stop_command.as_deref(), unit).await?;
        self.remove_agent(unit).await?;

        info!(unit = %unit, "Agent recalled");
        Ok(())
    }

    async fn deployed_units(&self) -> Result<Vec<UnitName>, ManagerError> {
        let init_dir = &self.config.init_dir;
        let mut entries = match tokio::fs::read_dir(init_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ManagerError::io(
                    format!("cannot list {}", init_dir.display()),
                    e,
                ))
            }
        };

        let mut units = Vec::new();
        loop {
            let entry = entries
                .next_entry()
                .await
                .map_err(|e| ManagerError::io(format!("cannot list {}", init_dir.display()), e))?;
            let Some(entry) = entry else { break };

            let file_name = entry.file_name();
            let Some(tag) = file_name
                .to_str()
                .and_then(|name| name.strip_prefix(SERVICE_PREFIX))
                .and_then(|name| name.strip_suffix(SERVICE_SUFFIX))
            else {
                continue;
            };
            if !tag.starts_with("unit-") {
                continue;
            }
            match UnitName::from_tag(tag) {
                Ok(unit) => units.push(unit),
                Err(e) => warn!(file = ?file_name, error = %e, "Skipping unrecognised service file"),
            }
        }

        units.sort();
        debug!(count = units.len(), "Listed deployed units");
        Ok(units)
    }

    fn manager_name(&self) -> &'static str {
        "simple"
    }
}

async fn create_dir(path: &Path) -> Result<(), ManagerError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| ManagerError::io(format!("cannot create {}", path.display()), e))
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<(), ManagerError> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|e| ManagerError::io(format!("cannot restrict {}", path.display()), e))
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<(), ManagerError> {
    Ok(())
}

/// Run a configured start/stop command for `unit`'s service, if any.
async fn run_hook(command: Option<&[String]>, unit: &UnitName) -> Result<(), ManagerError> {
    let Some((program, args)) = command.and_then(<[String]>::split_first) else {
        return Ok(());
    };
    let service = SimpleManager::service_name(unit);
    let args: Vec<String> = args
        .iter()
        .map(|arg| arg.replace(SERVICE_PLACEHOLDER, &service))
        .collect();
    let rendered = std::iter::once(program.as_str())
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ");

    debug!(unit = %unit, command = %rendered, "Running service command");
    let status = Command::new(program)
        .args(&args)
        .status()
        .await
        .map_err(|e| ManagerError::Command {
            command: rendered.clone(),
            reason: e.to_string(),
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(ManagerError::Command {
            command: rendered,
            reason: status.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(name: &str) -> UnitName {
        UnitName::parse(name).unwrap()
    }

    fn config(root: &Path) -> ManagerConfig {
        ManagerConfig {
            init_dir: root.join("init"),
            data_dir: root.join("data"),
            log_dir: root.join("log"),
            agent_binary: PathBuf::from("/usr/bin/berth-agent"),
            start_command: None,
            stop_command: None,
        }
    }

    #[test]
    fn service_file_runs_agent_with_its_config() {
        let manager = SimpleManager::new(config(Path::new("/srv")), "/srv/state.toml");
        let content = manager.service_file(&unit("app/0"));
        assert!(content.contains(
            "ExecStart=/usr/bin/berth-agent --unit app/0 --config /srv/data/agents/unit-app-0/agent.toml"
        ));
        assert!(content.contains("StandardOutput=append:/srv/log/unit-app-0.log"));
    }

    #[tokio::test]
    async fn missing_init_dir_means_nothing_deployed() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SimpleManager::new(config(dir.path()), dir.path().join("state.toml"));
        assert!(manager.deployed_units().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deployed_units_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SimpleManager::new(config(dir.path()), dir.path().join("state.toml"));
        let init = dir.path().join("init");
        std::fs::create_dir_all(&init).unwrap();
        std::fs::write(init.join("berth-unit-db-1.service"), "").unwrap();
        std::fs::write(init.join("berth-machine-0.service"), "").unwrap();
        std::fs::write(init.join("sshd.service"), "").unwrap();
        std::fs::write(init.join("berth-unit-bogus.service"), "").unwrap();

        assert_eq!(manager.deployed_units().await.unwrap(), vec![unit("db/1")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_start_command_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.start_command = Some(vec!["false".into()]);
        let manager = SimpleManager::new(cfg, dir.path().join("state.toml"));

        let err = manager
            .deploy(&unit("app/0"), &Credential::new("pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, ManagerError::Command { .. }));
        assert!(!manager.service_path(&unit("app/0")).exists());
        assert!(!manager.agent_dir(&unit("app/0")).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hooks_receive_service_name() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("started");
        let mut cfg = config(dir.path());
        cfg.start_command = Some(vec![
            "sh".into(),
            "-c".into(),
            format!("echo \"$0\" > {}", marker.display()),
            "{service}".into(),
        ]);
        let manager = SimpleManager::new(cfg, dir.path().join("state.toml"));

        manager
            .deploy(&unit("app/0"), &Credential::new("pw"))
            .await
            .unwrap();
        let started = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(started.trim(), "berth-unit-app-0.service");
    }
}
