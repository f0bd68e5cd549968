//! Storage Layer
//!
//! Append-only SQLite persistence for sensor readings.

mod repository;

pub use repository::{Reading, Repository};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Record not found")]
    NotFound,
}
