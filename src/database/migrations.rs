//! # Schema Migrations
//!
//! SQL files under `migrations/` are embedded at compile time and applied in
//! version order. Applying them twice is a no-op.

use crate::error::Result;
use sqlx::PgPool;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct DatabaseMigrations;

impl DatabaseMigrations {
    /// Apply every pending migration
    pub async fn run_all(pool: &PgPool) -> Result<()> {
        MIGRATOR.run(pool).await?;
        tracing::info!(
            migrations = MIGRATOR.iter().count(),
            "Database migrations applied"
        );
        Ok(())
    }
}
