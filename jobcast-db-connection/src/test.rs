#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::config::DEFAULT_MAX_CONNECTIONS;
    use crate::*;

    #[test]
    fn builder_defaults() {
        let config = DbConnectionConfig::new("sqlite::memory:")
            .with_busy_timeout(Duration::from_secs(2));
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.busy_timeout(), Duration::from_secs(2));
        assert_eq!(config.with_max_connections(3).max_connections, 3);
    }

    #[test]
    fn memory_detection() {
        assert!(DbConnectionConfig::new("sqlite::memory:").is_memory());
        assert!(DbConnectionConfig::new("sqlite://file:jobs?mode=memory&cache=shared").is_memory());
        assert!(!DbConnectionConfig::new("sqlite://jobs.sqlite").is_memory());
    }

    #[tokio::test]
    async fn memory_pool_keeps_single_database() {
        let pool = create_pool(&DbConnectionConfig::new("sqlite::memory:"))
            .await
            .expect("create pool");
        sqlx::query("CREATE TABLE scratch (id INTEGER PRIMARY KEY)")
            .execute(&pool)
            .await
            .expect("create table");
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scratch")
            .fetch_one(&pool)
            .await
            .expect("query scratch");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn file_pool_creates_missing_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("jobs.sqlite");
        let url = format!("sqlite://{}", path.display());
        let pool = create_pool(&DbConnectionConfig::new(url))
            .await
            .expect("create pool");
        assert!(path.exists());
        pool.close().await;
    }

    #[tokio::test]
    async fn rejects_unusable_settings() {
        let err = create_pool(&DbConnectionConfig::new("  ")).await.unwrap_err();
        assert!(matches!(err, DbConnectionError::EmptyDatabaseUrl));

        let config = DbConnectionConfig::new("sqlite::memory:").with_max_connections(0);
        let err = create_pool(&config).await.unwrap_err();
        assert!(matches!(err, DbConnectionError::NoConnections));
    }
}
