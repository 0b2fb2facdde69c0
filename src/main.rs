mod cli;
mod config;
mod mapping;
mod model;
mod providers;
mod state;
mod sync;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; real environment variables win over it.
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries the per-issue outcome lines.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("linear_notion_sync=info")),
        )
        .init();

    let cli = cli::Cli::parse();
    cli::run(cli).await
}
