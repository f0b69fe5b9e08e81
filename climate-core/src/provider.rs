use async_trait::async_trait;
use std::fmt::Debug;
use thiserror::Error;
use tokio::time::Instant;

use crate::model::RawWeather;

pub mod openweather;

pub use openweather::OpenWeatherProvider;

/// Any failure to obtain usable weather data from the provider.
///
/// Network errors, non-2xx statuses, malformed bodies, missing fields and an
/// elapsed deadline all end up here; only the message tells them apart.
#[derive(Debug, Error)]
#[error("{0:#}")]
pub struct FetchError(#[from] anyhow::Error);

impl FetchError {
    pub fn msg(detail: impl Into<String>) -> Self {
        Self(anyhow::anyhow!(detail.into()))
    }
}

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Current conditions for `city`, abandoned once `deadline` passes.
    async fn fetch(&self, city: &str, deadline: Instant) -> Result<RawWeather, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn fetch_error_displays_whole_context_chain() {
        let inner: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "connection reset"));
        let err = FetchError::from(inner.context("Failed to send request").unwrap_err());

        assert_eq!(err.to_string(), "Failed to send request: connection reset");
    }

    #[test]
    fn fetch_error_from_message() {
        let err = FetchError::msg("weather array was empty");
        assert_eq!(err.to_string(), "weather array was empty");
    }
}
