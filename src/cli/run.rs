//! Handler for the `run` command.

use tokio::signal;
use tracing::{info, warn};

use super::command::RunArgs;
use super::output;
use crate::error::Result;
use crate::infrastructure::bootstrap::Node;
use crate::infrastructure::config::settings::Config;

/// Execute the run command.
pub async fn execute(args: &RunArgs) -> Result<()> {
    let mut config = Config::load(&args.config)?;
    if let Some(level) = &args.log_level {
        config.logging.level.clone_from(level);
    }
    if args.json_logs || output::is_json() {
        config.logging.format = "json".to_string();
    }
    config.init_logging();

    output::header(env!("CARGO_PKG_VERSION"));
    output::field("Deployer", &config.deployer);
    output::field("State", config.state.path.display());
    output::field("Services", config.manager.init_dir.display());

    info!(deployer = %config.deployer, "berth starting");
    let node = Node::build(&config)?;
    node.run(async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C, running until the deployer exits");
            std::future::pending::<()>().await;
        }
    })
    .await?;

    info!("berth stopped");
    Ok(())
}
