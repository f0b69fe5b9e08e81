//! Append-only record store for observations.
//!
//! `SqliteObservationStore` keeps one `observations` table. Writes happen on
//! the blocking pool so a slow disk never stalls the async runtime, and every
//! write is bounded by the caller's deadline.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::{fmt::Debug, path::Path, sync::Arc};
use thiserror::Error;
use tokio::time::{Instant, timeout_at};

use crate::model::{NewObservation, Observation};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid stored timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("Store operation did not complete before the deadline")]
    DeadlineExceeded,

    #[error("Store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Failed to prepare store location: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ObservationStore: Send + Sync + Debug {
    /// Insert one row and return it with its assigned id.
    async fn insert(
        &self,
        observation: NewObservation,
        deadline: Instant,
    ) -> StoreResult<Observation>;

    async fn get(&self, id: i64) -> StoreResult<Option<Observation>>;
}

/// SQLite-backed observation store.
#[derive(Debug, Clone)]
pub struct SqliteObservationStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteObservationStore {
    /// Open (or create) the database file at `path`, creating parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// Private in-memory database, used by tests and one-off runs.
    pub fn in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        init_schema(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Number of stored observations.
    pub fn count(&self) -> StoreResult<usize> {
        let count: i64 =
            self.conn.lock().query_row("SELECT COUNT(*) FROM observations", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn insert_blocking(conn: &Connection, observation: NewObservation) -> StoreResult<Observation> {
        conn.execute(
            "INSERT INTO observations (city, temperature, humidity, wind_speed, condition, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                observation.city,
                observation.temperature,
                observation.humidity,
                observation.wind_speed,
                observation.condition,
                format_timestamp(&observation.recorded_at),
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(observation.with_id(id))
    }

    fn get_blocking(conn: &Connection, id: i64) -> StoreResult<Option<Observation>> {
        let row = conn
            .query_row(
                "SELECT id, city, temperature, humidity, wind_speed, condition, recorded_at
                 FROM observations WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, city, temperature, humidity, wind_speed, condition, recorded_at)| {
            Ok(Observation {
                id,
                city,
                temperature,
                humidity,
                wind_speed,
                condition,
                recorded_at: parse_timestamp(&recorded_at)?,
            })
        })
        .transpose()
    }
}

fn init_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS observations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            city TEXT NOT NULL,
            temperature REAL NOT NULL,
            humidity REAL NOT NULL,
            wind_speed REAL NOT NULL,
            condition TEXT NOT NULL,
            recorded_at TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::InvalidTimestamp(s.to_string()))
}

#[async_trait]
impl ObservationStore for SqliteObservationStore {
    async fn insert(
        &self,
        observation: NewObservation,
        deadline: Instant,
    ) -> StoreResult<Observation> {
        let conn = Arc::clone(&self.conn);
        let cutoff = deadline.into_std();
        let task = tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            // The caller may have given up while we waited for the lock.
            if std::time::Instant::now() >= cutoff {
                return Err(StoreError::DeadlineExceeded);
            }
            Self::insert_blocking(&conn, observation)
        });

        match timeout_at(deadline, task).await {
            Ok(joined) => joined?,
            Err(_) => Err(StoreError::DeadlineExceeded),
        }
    }

    async fn get(&self, id: i64) -> StoreResult<Option<Observation>> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || Self::get_blocking(&conn.lock(), id)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn sample(city: &str) -> NewObservation {
        NewObservation {
            city: city.to_string(),
            temperature: 21.5,
            humidity: 60.0,
            wind_speed: 3.2,
            condition: "clear sky".to_string(),
            recorded_at: Utc::now(),
        }
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let store = SqliteObservationStore::in_memory().unwrap();

        let first = store.insert(sample("London"), deadline()).await.unwrap();
        let second = store.insert(sample("London"), deadline()).await.unwrap();

        assert!(second.id > first.id);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[tokio::test]
    async fn get_round_trips_all_fields_exactly() {
        let store = SqliteObservationStore::in_memory().unwrap();
        let mut obs = sample("Reykjavík");
        obs.temperature = 0.1 + 0.2;
        obs.humidity = 1.0 / 3.0;
        obs.wind_speed = f64::MIN_POSITIVE;
        obs.recorded_at = Utc.timestamp_opt(1_760_000_000, 123_456_789).unwrap();

        let inserted = store.insert(obs, deadline()).await.unwrap();
        let fetched = store.get(inserted.id).await.unwrap().expect("row must exist");

        assert_eq!(fetched, inserted);
        assert_eq!(fetched.temperature.to_bits(), (0.1f64 + 0.2).to_bits());
        assert_eq!(fetched.humidity.to_bits(), (1.0f64 / 3.0).to_bits());
    }

    #[tokio::test]
    async fn get_missing_id_is_none() {
        let store = SqliteObservationStore::in_memory().unwrap();
        assert!(store.get(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn elapsed_deadline_fails_insert_without_writing() {
        let store = SqliteObservationStore::in_memory().unwrap();

        // Hold the connection so the insert cannot finish.
        let guard = store.conn.lock();
        let err = store
            .insert(sample("London"), Instant::now() + Duration::from_millis(50))
            .await
            .unwrap_err();
        drop(guard);

        assert!(matches!(err, StoreError::DeadlineExceeded));

        // Give the abandoned write time to take the lock and bail out.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(store.count().unwrap(), 0);

        store.insert(sample("London"), deadline()).await.unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("observations.db");

        let id = {
            let store = SqliteObservationStore::open(&path).unwrap();
            store.insert(sample("Oslo"), deadline()).await.unwrap().id
        };

        let reopened = SqliteObservationStore::open(&path).unwrap();
        let fetched = reopened.get(id).await.unwrap().expect("row must survive reopen");
        assert_eq!(fetched.city, "Oslo");
        assert_eq!(reopened.count().unwrap(), 1);
    }

    #[test]
    fn corrupt_timestamp_is_reported() {
        let err = parse_timestamp("yesterday").unwrap_err();
        assert!(err.to_string().contains("yesterday"));
    }
}
