//! Rollcall CLI - Command-line interface for event guest lists
//!
//! Register and check in guests from the terminal and keep the list in sync
//! with the shared cloud collection.

mod cli;
mod commands;
mod config;
mod error;

use clap::Parser;
use tracing_subscriber::filter::Directive;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::export::run_export;
use crate::commands::import::run_import;
use crate::commands::list::run_list;
use crate::commands::reset::run_reset;
use crate::commands::stats::run_stats;
use crate::commands::sync::run_sync;
use crate::commands::update::{run_check_in, run_update};
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "rollcall=info".parse::<Directive>() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Add { name, details } => run_add(&name, &details, &db_path).await?,
        Commands::Update {
            name,
            details,
            flags,
        } => run_update(&name, &details, flags, &db_path).await?,
        Commands::CheckIn { name } => run_check_in(&name, &db_path).await?,
        Commands::Delete { name } => run_delete(&name, &db_path).await?,
        Commands::List { filter, json } => run_list(&filter, json, &db_path).await?,
        Commands::Stats { json } => run_stats(json, &db_path).await?,
        Commands::Sync => run_sync(&db_path).await?,
        Commands::Watch { filter } => run_watch(&filter, &db_path).await?,
        Commands::Reset { yes } => run_reset(yes, &db_path).await?,
        Commands::Export { format, output } => {
            run_export(format, output.as_deref(), &db_path).await?;
        }
        Commands::Import { path } => run_import(&path, &db_path).await?,
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
        Commands::Config { command } => run_config(command)?,
    }

    Ok(())
}
