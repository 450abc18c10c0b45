//! PV Map CLI - Command-line interface
//!
//! Searches, clusters and inspects PV projects from the terminal.

mod cli;
mod commands;
mod context;
mod errors;
mod output;
mod output_types;
mod progress;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use errors::CliError;

fn main() -> Result<()> {
    // Initialize tracing; logs go to stderr so JSON output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Create async runtime
    let runtime = tokio::runtime::Runtime::new()?;

    // Execute the command
    match runtime.block_on(commands::execute(cli)) {
        Ok(()) => Ok(()),
        Err(e) => match e.downcast_ref::<CliError>() {
            Some(cli_error) => {
                cli_error.display();
                std::process::exit(1);
            }
            None => Err(e),
        },
    }
}
