mod cli;
mod config;
mod error;
mod gate;
mod llm;
mod parser;
mod quiz;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Only warnings by default, use RUST_LOG=info for more detail
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            cli::commands::init::run(force).await?;
        }
        Commands::Auth { service, key, list } => {
            cli::commands::auth::run(service, key, list).await?;
        }
        Commands::Start { path } => {
            cli::commands::start::run(path).await?;
        }
    }

    Ok(())
}
