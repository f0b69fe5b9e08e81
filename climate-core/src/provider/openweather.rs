use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::time::{Instant, timeout_at};
use tracing::debug;

use crate::{config::ProviderConfig, model::RawWeather};

use super::{FetchError, WeatherProvider};

/// Current-weather client for OpenWeatherMap and compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            api_key: config.api_key,
            base_url: config.base_url,
            http: Client::new(),
        }
    }

    async fn fetch_current(&self, city: &str) -> Result<RawWeather> {
        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("q", city),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .context("Failed to send request to OpenWeather (current weather)")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("Failed to read OpenWeather current response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "OpenWeather current request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        parse_current(&body)
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
}

fn parse_current(body: &str) -> Result<RawWeather> {
    let parsed: OwCurrentResponse =
        serde_json::from_str(body).context("Failed to parse OpenWeather current JSON")?;

    let condition = parsed
        .weather
        .into_iter()
        .next()
        .map(|w| w.description)
        .ok_or_else(|| anyhow!("OpenWeather response contained no weather entries"))?;

    Ok(RawWeather {
        temperature: parsed.main.temp,
        humidity: parsed.main.humidity,
        wind_speed: parsed.wind.speed,
        condition,
    })
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn fetch(&self, city: &str, deadline: Instant) -> Result<RawWeather, FetchError> {
        debug!(city, "requesting current weather");

        match timeout_at(deadline, self.fetch_current(city)).await {
            Ok(result) => result.map_err(FetchError::from),
            Err(_) => Err(FetchError::msg(format!(
                "OpenWeather request for '{city}' did not complete before the deadline"
            ))),
        }
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
