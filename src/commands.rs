//! CLI command definitions

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create one pending test per row of the template's scenarios
    Enroll {
        /// Template under templates/ (default from config, else "power")
        #[arg(long)]
        template: Option<String>,
    },

    /// Resume the running test, or claim and run the next pending one
    Run {
        /// Template under templates/ (default from config, else "power")
        #[arg(long)]
        template: Option<String>,
    },

    /// Print the finished results as a Markdown table
    Report {
        /// Template under templates/ (default from config, else "power")
        #[arg(long)]
        template: Option<String>,
    },
}

impl Commands {
    /// Template override given on the command line
    pub fn template(&self) -> Option<String> {
        match self {
            Commands::Enroll { template }
            | Commands::Run { template }
            | Commands::Report { template } => template.clone(),
        }
    }
}
