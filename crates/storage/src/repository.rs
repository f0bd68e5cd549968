//! Repository Implementation

use crate::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Maximum pooled connections for file-backed databases
const MAX_CONNECTIONS: u32 = 5;

/// Time to wait for a free connection
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

const CREATE_READINGS: &str = "CREATE TABLE IF NOT EXISTS readings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    turbidity REAL,
    temperature REAL,
    timestamp DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
)";

/// A single persisted sensor reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reading {
    /// Store-assigned, strictly increasing
    pub id: i64,
    pub turbidity: Option<f64>,
    pub temperature: Option<f64>,
    /// Time of insertion, assigned by the database
    pub timestamp: DateTime<Utc>,
}

/// Repository for reading access
///
/// Cloning is cheap; every clone shares the same connection pool. One writer
/// and any number of readers can use it concurrently, isolation is left to
/// SQLite's WAL mode.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Open the SQLite database at `url`, creating the file if missing
    ///
    /// # Arguments
    /// * `url` - SQLite connection URL, e.g. `sqlite:water_quality.db`
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        info!("Opening SQLite repository at {}", url);

        let options = SqliteConnectOptions::from_str(url)?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Open a private in-memory database
    ///
    /// The pool holds exactly one connection that is never recycled, so the
    /// data lives as long as the repository does.
    pub async fn in_memory() -> Result<Self, StorageError> {
        debug!("Opening in-memory repository");

        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Create the readings table if absent. Safe to call repeatedly.
    pub async fn initialize(&self) -> Result<(), StorageError> {
        sqlx::query(CREATE_READINGS).execute(&self.pool).await?;
        debug!("Readings table ready");
        Ok(())
    }

    /// Append a reading and return it as stored
    pub async fn insert(
        &self,
        turbidity: Option<f64>,
        temperature: Option<f64>,
    ) -> Result<Reading, StorageError> {
        let reading = sqlx::query_as::<_, Reading>(
            "INSERT INTO readings (turbidity, temperature) VALUES (?, ?) \
             RETURNING id, turbidity, temperature, timestamp",
        )
        .bind(turbidity)
        .bind(temperature)
        .fetch_one(&self.pool)
        .await?;

        debug!("Inserted reading with ID {}", reading.id);
        Ok(reading)
    }

    /// Get up to `limit` readings, newest first
    ///
    /// Limits beyond what SQLite can represent saturate, returning every row.
    pub async fn list_recent(&self, limit: u64) -> Result<Vec<Reading>, StorageError> {
        let readings = sqlx::query_as::<_, Reading>(
            "SELECT id, turbidity, temperature, timestamp FROM readings \
             ORDER BY timestamp DESC, id DESC LIMIT ?",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(readings)
    }

    /// Get the most recent reading
    pub async fn latest(&self) -> Result<Reading, StorageError> {
        self.list_recent(1)
            .await?
            .into_iter()
            .next()
            .ok_or(StorageError::NotFound)
    }

    /// Get total reading count
    pub async fn count(&self) -> Result<i64, StorageError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM readings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Close the connection pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
