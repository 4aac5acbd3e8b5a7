//! bootrun - reboot-spanning hardware test runner
//!
//! Walks an operator through a table of suspend/resume scenarios, one test
//! per invocation, keeping all progress in a directory tree that survives
//! reboots.

use bootrun::commands::Commands;
use bootrun::common::config::Config;
use bootrun::common::logging;
use bootrun::{cli, Result};
use clap::Parser;

#[derive(Parser)]
#[command(name = "bootrun", about = "Reboot-spanning hardware test runner")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?.with_template(cli.command.template());
    logging::init(&config.layout().log_file());
    tracing::debug!("Loaded configuration: {:?}", config);
    cli::dispatch(cli.command, &config)
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        tracing::error!(code = e.code(), "{}", e);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
