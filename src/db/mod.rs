use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::{MemoryStore, PostgresStore};
use crate::config::Config;
use crate::ports::SaccoStore;

pub async fn create_pool(config: &Config, database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

/// Applies the SQL migrations found in `dir`.
pub async fn run_migrations(pool: &PgPool, dir: &Path) -> anyhow::Result<()> {
    let migrator = Migrator::new(dir).await?;
    migrator.run(pool).await?;
    tracing::info!("Database migrations completed");
    Ok(())
}

/// Opens the configured store: Postgres when `DATABASE_URL` is set (with
/// migrations applied), otherwise a process-local in-memory store.
pub async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn SaccoStore>> {
    match config.database_url.as_deref() {
        Some(url) => {
            let pool = create_pool(config, url).await?;
            run_migrations(&pool, &config.migrations_dir).await?;
            Ok(Arc::new(PostgresStore::new(pool)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store; data will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
