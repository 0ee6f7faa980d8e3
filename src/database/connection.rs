use crate::config::DatabaseConfig;
use crate::error::{Result, WorkflowError};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::time::Duration;

/// Pooled PostgreSQL connection for the SQL order store
pub struct DatabaseConnection {
    pool: PgPool,
}

crate::debug_with_pgpool!(DatabaseConnection { pool: PgPool });

impl DatabaseConnection {
    /// Connect using `database.url`, falling back to `DATABASE_URL`
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let database_url = config.database_url().ok_or_else(|| {
            WorkflowError::Infrastructure(
                "no database url configured (database.url or DATABASE_URL)".to_string(),
            )
        })?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .test_before_acquire(true)
            .connect(&database_url)
            .await?;

        tracing::debug!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<bool> {
        let row = sqlx::query("SELECT 1 AS health")
            .fetch_one(&self.pool)
            .await?;

        let health: i32 = row.get("health");
        Ok(health == 1)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
