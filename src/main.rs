use std::process::ExitCode;

use anyhow::Context;
use berth::cli::command::{CheckCommand, Cli, Commands};
use berth::cli::output::{self, OutputConfig};
use berth::cli::{check, run, status};
use clap::Parser;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    output::configure(OutputConfig::new(cli.json, cli.quiet), cli.color);

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run::execute(&args).await.context("deployer exited"),
        Commands::Status(arg) => status::execute(&arg.config)
            .await
            .context("cannot read node status"),
        Commands::Check(CheckCommand::Config(arg)) => check::execute_config(&arg.config)
            .with_context(|| format!("invalid configuration {}", arg.config.display())),
    }
}
