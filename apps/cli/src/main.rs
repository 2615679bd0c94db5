//! sshpoint entry point.

mod archive;
mod cli;
mod config;
mod logging;
mod pipeline;
mod render;

use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    if let Err(e) = logging::init(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("sshpoint: {e:#}");
        return ExitCode::FAILURE;
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting sshpoint");

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "sshpoint failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &cli::Cli) -> anyhow::Result<()> {
    let config = config::AppConfig::load(&cli.config)?;
    tracing::info!(path = %cli.config.display(), "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(pipeline::run(cli, &config))
}
