//! Core library for the `climate` service.
//!
//! This crate defines:
//! - Configuration (provider credentials, store location, bind address)
//! - The weather provider client
//! - The observation record store
//! - The ingestion pipeline tying them together
//!
//! It is used by `climate-server`, but can also be reused by other binaries or services.

pub mod config;
pub mod model;
pub mod provider;
pub mod recorder;
pub mod store;

pub use config::{Config, ProviderConfig};
pub use model::{NewObservation, Observation, RawWeather};
pub use provider::{FetchError, OpenWeatherProvider, WeatherProvider};
pub use recorder::{ObservationRecorder, RecordError};
pub use store::{ObservationStore, SqliteObservationStore, StoreError};
