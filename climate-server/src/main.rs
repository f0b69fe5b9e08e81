//! Binary crate for the `climate` service.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Serving the HTTP API
//! - Logging setup

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod http;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "climate=info,climate_core=info,tower_http=info".into()),
        )
        .init();

    let cmd = cli::Cli::parse();
    cmd.run().await
}
