mod leads;
mod models;
mod users;

pub use leads::*;
pub use models::*;
pub use users::*;

use anyhow::{bail, Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::validation::FieldErrors;

pub type DbPool = SqlitePool;

/// Failures of the lead and user stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("a record with this email already exists")]
    DuplicateEmail,
    #[error(transparent)]
    Validation(#[from] FieldErrors),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Classify a write error; unique violations become [`StoreError::DuplicateEmail`]
pub(crate) fn write_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::DuplicateEmail,
        _ => StoreError::Database(err),
    }
}

/// Execute a SQL migration file, properly handling comments
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in sql.split(';') {
        let cleaned: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = cleaned.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }
    Ok(())
}

pub async fn init(config: &DatabaseConfig) -> Result<DbPool> {
    info!(url = %config.url, "Initializing database");

    if !config.url.starts_with("sqlite:") {
        bail!("Unsupported database url (expected sqlite:...): {}", config.url);
    }

    let options = SqliteConnectOptions::from_str(&config.url)
        .with_context(|| format!("Invalid database url: {}", config.url))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true);

    if let Some(parent) = options.get_filename().parent() {
        if !parent.as_os_str().is_empty() && !config.url.contains(":memory:") {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    run_migrations(&pool).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    execute_sql(pool, include_str!("../../migrations/001_users.sql"))
        .await
        .context("Migration 001_users failed")?;
    execute_sql(pool, include_str!("../../migrations/002_leads.sql"))
        .await
        .context("Migration 002_leads failed")?;

    Ok(())
}

/// Fresh in-memory database for tests. One connection, since every
/// SQLite memory connection is its own database.
#[cfg(test)]
pub(crate) async fn test_pool() -> DbPool {
    init(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    })
    .await
    .expect("in-memory database")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = test_pool().await;
        run_migrations(&pool).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'leads') ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(
            tables.into_iter().map(|(t,)| t).collect::<Vec<_>>(),
            vec!["leads", "users"]
        );
    }

    #[tokio::test]
    async fn test_file_database_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("leadgrid.db");
        let pool = init(&DatabaseConfig {
            url: format!("sqlite://{}", path.display()),
            max_connections: 2,
        })
        .await
        .unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM leads")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_bad_url_is_reported() {
        let result = init(&DatabaseConfig {
            url: "postgres://nope".to_string(),
            max_connections: 1,
        })
        .await;
        assert!(result.is_err());
    }
}
