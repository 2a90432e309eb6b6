//! Error types for the content store.

use jobcast_db_connection::DbConnectionError;
use thiserror::Error;

use crate::types::RecordId;

/// Errors surfaced by [`ContentStore`](crate::ContentStore) implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(RecordId),

    #[error("content store is unavailable: {0}")]
    Unavailable(String),

    #[error("stored value is malformed: {0}")]
    Malformed(String),

    #[error("database connection error: {0}")]
    Connection(#[from] DbConnectionError),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Unavailable(err.to_string())
            }
            other => Self::Database(other),
        }
    }
}
