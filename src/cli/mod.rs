//! CLI command handling
//!
//! Dispatches CLI commands to the library and formats output.

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::Result;
use crate::menu::PromptMenu;
use crate::report::Report;
use crate::runner::{self, CycleOutcome, Runner, TestRun};
use crate::scenario::ScenarioStore;
use crate::system::HostSystem;

/// Dispatch a CLI command against an already loaded configuration
pub fn dispatch(command: Commands, config: &Config) -> Result<()> {
    let store = ScenarioStore::new();

    match command {
        Commands::Enroll { .. } => {
            let enrolled = runner::enroll(config, &store)?;
            println!("Enrolled {} test(s):", enrolled.len());
            for dir in &enrolled {
                println!("  {}", dir.display());
            }
            Ok(())
        }

        Commands::Run { .. } => {
            config.validate()?;
            let system = HostSystem::from_config(config);
            let mut menu = PromptMenu::stdio();
            let outcome = Runner::new(config, &store, &system, &mut menu).run_cycle()?;

            match &outcome {
                CycleOutcome::Resumed(runs) => runs.iter().for_each(print_run),
                CycleOutcome::Started(run) => print_run(run),
                CycleOutcome::Idle => {
                    println!("No tests running");
                    println!("No tests pending");
                }
            }

            println!();
            print!("{}", Report::gather(config, &store)?);
            Ok(())
        }

        Commands::Report { .. } => {
            config.validate()?;
            print!("{}", Report::gather(config, &store)?);
            Ok(())
        }
    }
}

fn print_run(run: &TestRun) {
    let name = run
        .test_directory
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match (&run.choice, &run.result_directory) {
        (Some(choice), Some(dest)) => {
            println!("{}: {} -> {}", name, choice, dest.display())
        }
        (Some(choice), None) => println!("{}: {}", name, choice),
        (None, Some(dest)) => println!("{}: no result -> {}", name, dest.display()),
        (None, None) => println!("{}: no result", name),
    }
}
