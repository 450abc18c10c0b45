//! Command implementations

mod config;
mod expand;
mod explore;
mod project;
mod search;

use crate::cli::{Cli, Commands};
use crate::context::AppContext;
use crate::output::OutputWriter;
use anyhow::Result;

/// Execute a CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let output = OutputWriter::new(cli.json);
    let ctx = AppContext::new(&cli)?;

    match cli.command {
        Commands::Search(args) => search::execute(args, &ctx, &output).await,
        Commands::Expand(args) => expand::execute(args, &ctx, &output).await,
        Commands::Project(args) => project::execute(args, &ctx, &output).await,
        Commands::Explore(args) => explore::execute(args, &ctx, &output).await,
        Commands::Config => config::execute(&ctx, &output),
    }
}
