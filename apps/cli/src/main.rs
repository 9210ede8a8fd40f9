use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use client_core::{HttpRecordStore, ImageStore, ViewStateCoordinator};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::Command;

#[derive(Parser, Debug)]
#[command(name = "roster", about = "Record names, ages and photos in a realtime store")]
struct Cli {
    /// Settings file; defaults to ./roster.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides the store base URL from settings.
    #[arg(long)]
    store_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = config::load_settings(cli.config.as_deref())?;
    if let Some(store_url) = cli.store_url {
        settings.store_url = store_url;
    }
    debug!(?settings, "resolved settings");

    let store = Arc::new(HttpRecordStore::new(
        settings.store_url.clone(),
        settings.collection.clone(),
    ));
    let coordinator = ViewStateCoordinator::new(store, ImageStore::new(settings.image_dir))
        .with_refresh_policy(settings.refresh_after_save);

    let mut stdout = std::io::stdout();
    commands::run(&coordinator, cli.command, &mut stdout).await
}
