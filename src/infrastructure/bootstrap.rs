//! Composition root: wires the file-backed state store and the simple
//! manager into a running deployer.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::adapter::manager::SimpleManager;
use crate::adapter::state::FileState;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use crate::port::{Manager, UnitState};
use crate::runtime::Deployer;

/// The collaborators one deployer process runs with.
pub struct Node {
    deployer_name: String,
    poll_interval: Duration,
    state: Arc<FileState>,
    manager: Arc<SimpleManager>,
}

impl Node {
    /// Open the state document and build the manager described by `config`.
    pub fn build(config: &Config) -> Result<Self> {
        let state = Arc::new(FileState::open(&config.state.path)?);
        let manager = Arc::new(SimpleManager::new(
            config.manager.clone(),
            config.state.path.clone(),
        ));
        Ok(Self {
            deployer_name: config.deployer.clone(),
            poll_interval: config.state.poll_interval(),
            state,
            manager,
        })
    }

    #[must_use]
    pub fn deployer_name(&self) -> &str {
        &self.deployer_name
    }

    #[must_use]
    pub fn state(&self) -> &Arc<FileState> {
        &self.state
    }

    #[must_use]
    pub fn manager(&self) -> &Arc<SimpleManager> {
        &self.manager
    }

    /// Run the deployer until it fails or `shutdown` resolves.
    ///
    /// The state document is polled for external edits for as long as the
    /// deployer runs.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let (poll_tx, poll_rx) = watch::channel(false);
        let poller = tokio::spawn(Arc::clone(&self.state).poll(self.poll_interval, poll_rx));

        let feed = self.state.watch_units(self.deployer_name.as_str());
        let state: Arc<dyn UnitState> = self.state.clone();
        let manager: Arc<dyn Manager> = self.manager.clone();
        let handle = Deployer::new(self.deployer_name.as_str(), state, manager).start(Box::new(feed));
        info!(
            deployer = %self.deployer_name,
            state = %self.state.path().display(),
            "Deployer running"
        );

        let result = tokio::select! {
            result = handle.wait() => result,
            () = shutdown => {
                info!("Shutdown signal received");
                handle.stop().await
            }
        };

        poll_tx.send_replace(true);
        if let Err(e) = poller.await {
            warn!(error = %e, "State poller did not shut down cleanly");
        }
        result.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UnitName;

    fn config(dir: &std::path::Path) -> Config {
        let content = format!(
            r#"
deployer = "machine-0"

[state]
path = "{state}"
poll_interval_ms = 10

[manager]
init_dir = "{init}"
data_dir = "{data}"
log_dir = "{log}"
agent_binary = "/usr/bin/true"
"#,
            state = dir.join("state.toml").display(),
            init = dir.join("init").display(),
            data = dir.join("data").display(),
            log = dir.join("log").display(),
        );
        Config::parse_toml_with_env(&content, |_| None).unwrap()
    }

    #[tokio::test]
    async fn runs_until_shutdown_and_picks_up_external_edits() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        std::fs::write(
            &config.state.path,
            "[[units]]\nname = \"app/0\"\nlife = \"alive\"\ndeployer = \"machine-0\"\n",
        )
        .unwrap();

        let node = Node::build(&config).unwrap();
        let state = Arc::clone(node.state());
        let manager = Arc::clone(node.manager());
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let running = tokio::spawn(node.run(async move {
            let _ = stop_rx.wait_for(|stop| *stop).await;
        }));

        let app0 = UnitName::parse("app/0").unwrap();
        wait_until(|| manager.service_path(&app0).exists()).await;

        // Another actor marks the unit Dead in the document.
        std::fs::write(
            &config.state.path,
            "[[units]]\nname = \"app/0\"\nlife = \"dead\"\ndeployer = \"machine-0\"\n",
        )
        .unwrap();
        wait_until(|| state.memory().record(&app0).is_none()).await;
        assert!(!manager.service_path(&app0).exists());

        stop_tx.send_replace(true);
        running.await.unwrap().unwrap();
        assert!(state.memory().record(&app0).is_none());
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..500 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }
}
