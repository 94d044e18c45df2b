//! Handler for the `status` command.

use std::path::Path;

use super::output;
use crate::adapter::manager::SimpleManager;
use crate::adapter::state::FileState;
use crate::domain::Life;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use crate::port::{Manager, UnitState};

/// Show the units deployed by this node's manager next to what state says
/// about them.
pub async fn execute(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let state = FileState::open(&config.state.path)?;
    let manager = SimpleManager::new(config.manager.clone(), config.state.path.clone());

    output::header(env!("CARGO_PKG_VERSION"));
    output::field("Deployer", &config.deployer);
    output::field("State", config.state.path.display());

    let units = manager.deployed_units().await?;
    output::section(&format!("Deployed units ({})", units.len()));

    let mut stale = 0;
    for name in &units {
        match state.unit(name).await {
            Ok(unit) => {
                let owner = unit.deployer_name().unwrap_or("unassigned");
                if unit.life() == Life::Dead || !unit.is_assigned_to(&config.deployer) {
                    stale += 1;
                }
                output::unit(name.as_str(), unit.life().as_str(), owner);
            }
            Err(e) if e.is_not_found() => {
                stale += 1;
                output::unit(name.as_str(), "removed", "-");
            }
            Err(e) => return Err(e.into()),
        }
    }

    if stale > 0 {
        output::warning(&format!(
            "{stale} unit(s) will be recalled when the deployer next runs"
        ));
    } else if !units.is_empty() {
        output::success("All deployed units are current");
    }
    Ok(())
}
