//! Database module.
//!
//! This module provides the persistence layer using SQLite with sqlx.
//! It includes connection pool management, row models and the storage
//! adapters used by the ingestion pipeline.

pub mod dead_letter;
pub mod models;
pub mod storage;

pub use dead_letter::{DeadLetter, DeadLetterStore};
pub use storage::{SqlxStorage, Storage};

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

/// Database connection pool type alias.
pub type DbPool = Pool<Sqlite>;

/// Connection pool settings.
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub max_connections: u32,
    /// How long a writer waits on a locked database.
    pub busy_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(2);
        Self {
            max_connections: (cores * 2).clamp(2, 10),
            busy_timeout: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Open a pool in WAL mode.
///
/// `database_url` is a sqlx SQLite URL such as
/// `sqlite:notifications.db?mode=rwc` or `sqlite::memory:`.
pub async fn init_pool_with(
    database_url: &str,
    settings: PoolSettings,
) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(settings.busy_timeout)
        .pragma("temp_store", "MEMORY")
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect_with(options)
        .await?;

    // In-memory databases report "memory" and never switch to WAL.
    let mode = journal_mode(&pool).await?;
    if mode != "wal" && mode != "memory" {
        warn!(mode = %mode, "Database is not in WAL mode");
    }

    info!(max_connections = settings.max_connections, journal_mode = %mode, "Database pool initialized");
    Ok(pool)
}

/// Open a pool with default settings.
pub async fn init_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    init_pool_with(database_url, PoolSettings::default()).await
}

pub async fn journal_mode(pool: &DbPool) -> Result<String, sqlx::Error> {
    let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode").fetch_one(pool).await?;
    Ok(mode.to_ascii_lowercase())
}

pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations completed");
    Ok(())
}

/// Round-trip a trivial query.
pub async fn ping(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_pool() {
        let pool = init_pool("sqlite::memory:").await.unwrap();

        let mode = journal_mode(&pool).await.unwrap();
        assert!(mode == "memory" || mode == "wal");
        ping(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_migrations_create_tables() {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .fetch_all(&pool)
                .await
                .unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();

        assert!(names.contains(&"notifications"));
        assert!(names.contains(&"notification_dead_letter"));
    }
}
