//! # Voicify CLI
//!
//! Inspect and edit the command catalog, and dry-run replays against
//! captured windows.

mod cli;
mod commands;
mod render;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use voicify_core::VoicifyConfig;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Default to warn to keep output clean; RUST_LOG or --verbose for more.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let mut config = VoicifyConfig::load_from(cli.config.as_deref())?;
    if let Some(catalog) = cli.catalog.clone() {
        config = config.with_catalog_path(catalog);
    }

    match cli.command {
        Some(Commands::List) | None => {
            commands::list::run(&config)?;
        }
        Some(Commands::Show { app, command }) => {
            commands::show::run(&config, &app, &command)?;
        }
        Some(Commands::Match { app, phrase }) => {
            commands::match_cmd::run(&config, &app, &phrase)?;
        }
        Some(Commands::Remove { app, command }) => {
            commands::remove::run(config, &app, &command)?;
        }
        Some(Commands::Clear { yes }) => {
            commands::clear::run(config, yes)?;
        }
        Some(Commands::Replay {
            phrase,
            snapshot,
            no_wait,
            json,
        }) => {
            commands::replay::run(config, &phrase, &snapshot, no_wait, json).await?;
        }
    }

    Ok(())
}
