//! Ingestion pipeline: fetch, normalize, persist, return.

use chrono::Utc;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::{
    model::{NewObservation, Observation},
    provider::{FetchError, WeatherProvider},
    store::{ObservationStore, StoreError},
};

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Error fetching weather data: {0}")]
    Fetch(#[from] FetchError),

    #[error("Error persisting observation: {0}")]
    Persistence(#[from] StoreError),
}

/// Records the current weather for a city as a new observation row.
#[derive(Debug, Clone)]
pub struct ObservationRecorder {
    provider: Arc<dyn WeatherProvider>,
    store: Arc<dyn ObservationStore>,
    timeout: Duration,
}

impl ObservationRecorder {
    /// `timeout` bounds one whole ingestion, provider call and store write together.
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        store: Arc<dyn ObservationStore>,
        timeout: Duration,
    ) -> Self {
        Self { provider, store, timeout }
    }

    pub fn store(&self) -> &Arc<dyn ObservationStore> {
        &self.store
    }

    /// Fetch and persist, reporting which stage failed.
    ///
    /// Every successful call inserts exactly one new row; nothing is deduplicated.
    pub async fn record(&self, city: &str) -> Result<Observation, RecordError> {
        let deadline = Instant::now() + self.timeout;

        let raw = self.provider.fetch(city, deadline).await?;
        let observation = NewObservation::from_raw(city, raw, Utc::now());
        let saved = self.store.insert(observation, deadline).await?;

        info!(id = saved.id, city = %saved.city, "recorded observation");
        Ok(saved)
    }

    /// Like [`record`](Self::record), but a provider failure is logged and
    /// reported as `None`.
    ///
    /// Callers cannot tell an unknown city from an unreachable provider this
    /// way. Store failures are returned as errors rather than folded into
    /// `None` alongside provider failures.
    pub async fn record_current_weather(
        &self,
        city: &str,
    ) -> Result<Option<Observation>, StoreError> {
        match self.record(city).await {
            Ok(observation) => Ok(Some(observation)),
            Err(RecordError::Fetch(err)) => {
                warn!(city, error = %err, "Error fetching weather data");
                Ok(None)
            }
            Err(RecordError::Persistence(err)) => Err(err),
        }
    }
}
