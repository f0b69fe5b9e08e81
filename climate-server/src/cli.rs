use anyhow::Context;
use clap::{Parser, Subcommand};
use climate_core::{Config, ObservationRecorder, OpenWeatherProvider, SqliteObservationStore};
use inquire::{Password, Text};
use std::{path::PathBuf, sync::Arc};
use tracing::info;

use crate::http;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "climate", version, about = "Live climate observation service")]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the HTTP API.
    Serve {
        /// Address to listen on, e.g. "127.0.0.1:8080".
        #[arg(long)]
        bind: Option<String>,
    },

    /// Record the current weather for a city once and print it as JSON.
    Record {
        /// City name, passed to the provider as-is.
        city: String,
    },

    /// Store provider credentials in the config file.
    Configure,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Serve { bind } => {
                let config = load_config(self.config.as_ref())?;
                let bind = bind.unwrap_or_else(|| config.server.bind.clone());
                let recorder = build_recorder(&config)?;
                http::run_http_server(recorder, &bind).await
            }
            Command::Record { city } => {
                let config = load_config(self.config.as_ref())?;
                let recorder = build_recorder(&config)?;
                let observation = recorder.record_current_weather(&city).await?;
                println!("{}", serde_json::to_string_pretty(&observation)?);
                Ok(())
            }
            Command::Configure => configure(self.config),
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

/// Wire provider and store from configuration.
fn build_recorder(config: &Config) -> anyhow::Result<ObservationRecorder> {
    let provider = OpenWeatherProvider::new(config.provider_config()?);

    let db_path = config.store_path()?;
    let store = SqliteObservationStore::open(&db_path)
        .with_context(|| format!("Failed to open record store: {}", db_path.display()))?;
    info!(path = %db_path.display(), "record store opened");

    Ok(ObservationRecorder::new(
        Arc::new(provider),
        Arc::new(store),
        config.request_timeout(),
    ))
}

fn configure(path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = match path {
        Some(path) => path,
        None => Config::config_file_path()?,
    };

    let mut config = if path.exists() { Config::load_from(&path)? } else { Config::default() };

    let api_key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let base_url = Text::new("Provider base URL:")
        .with_default(&config.provider.base_url)
        .prompt()
        .context("Failed to read base URL")?;

    config.set_provider(api_key, Some(base_url));
    config.save_to(&path)?;

    println!("Saved configuration to {}", path.display());
    Ok(())
}
