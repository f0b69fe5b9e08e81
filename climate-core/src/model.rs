use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized current conditions as reported by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RawWeather {
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub condition: String,
}

/// An observation that has not been written to the store yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewObservation {
    pub city: String,
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub condition: String,
    pub recorded_at: DateTime<Utc>,
}

impl NewObservation {
    /// Stamp provider data for `city` with the time it is about to be persisted.
    pub fn from_raw(city: &str, raw: RawWeather, recorded_at: DateTime<Utc>) -> Self {
        Self {
            city: city.to_string(),
            temperature: raw.temperature,
            humidity: raw.humidity,
            wind_speed: raw.wind_speed,
            condition: raw.condition,
            recorded_at,
        }
    }

    /// Attach the identifier assigned by the store.
    pub fn with_id(self, id: i64) -> Observation {
        Observation {
            id,
            city: self.city,
            temperature: self.temperature,
            humidity: self.humidity,
            wind_speed: self.wind_speed,
            condition: self.condition,
            recorded_at: self.recorded_at,
        }
    }
}

/// A persisted weather reading for one city at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub id: i64,
    pub city: String,
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub condition: String,
    pub recorded_at: DateTime<Utc>,
}
