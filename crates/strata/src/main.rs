use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use strata::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    cli.execute().await
}
