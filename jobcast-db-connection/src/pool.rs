use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::config::DbConnectionConfig;
use crate::error::DbConnectionError;

pub type DbPool = SqlitePool;

/// Open a pool for `config.url`.
///
/// File databases are created on first use, run in WAL mode and may be
/// shared by several worker processes. An in-memory database is pinned to a
/// single connection that is never reaped.
pub async fn create_pool(config: &DbConnectionConfig) -> Result<DbPool, DbConnectionError> {
    let url = config.url.trim();
    if url.is_empty() {
        return Err(DbConnectionError::EmptyDatabaseUrl);
    }
    if config.max_connections == 0 {
        return Err(DbConnectionError::NoConnections);
    }

    let options = SqliteConnectOptions::from_str(url)?
        .foreign_keys(true)
        .busy_timeout(config.busy_timeout());
    let pool_options = SqlitePoolOptions::new().acquire_timeout(config.acquire_timeout());

    let memory = config.is_memory();
    tracing::debug!(
        db_url = url,
        max_connections = config.max_connections,
        memory,
        "creating sqlite pool"
    );

    let pool = if memory {
        pool_options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        ensure_parent_dir(options.get_filename())?;
        pool_options
            .max_connections(config.max_connections)
            .connect_with(
                options
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal),
            )
            .await?
    };
    Ok(pool)
}

fn ensure_parent_dir(db_file: &Path) -> Result<(), DbConnectionError> {
    match db_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            std::fs::create_dir_all(parent).map_err(|source| DbConnectionError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}
