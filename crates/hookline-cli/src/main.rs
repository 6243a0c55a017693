mod cli;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    hookline_engine::init_logging();

    // Parse CLI args
    let cli = Cli::parse();

    match cli.command {
        // init writes a fresh rules file and needs no existing one
        Commands::Init { path } => {
            commands::init::run_init(&path)?;
        }
        Commands::Check => {
            let rules_path = config::resolve_rules_path(cli.config.as_deref());
            commands::check::execute(&rules_path)?;
        }
        Commands::Dispatch { event, dry_run } => {
            let rules_path = config::resolve_rules_path(cli.config.as_deref());
            let code =
                commands::dispatch::execute(&rules_path, event, dry_run, cli.verbose).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
    }

    Ok(())
}
