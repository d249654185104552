//! Database module for SQLite persistence
//!
//! Stores trained model records and oracle-labeled training examples.

mod examples;
mod models;
mod schema;

pub use examples::*;
pub use models::*;
pub use schema::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::error::Result;

/// Create a new database connection pool
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run migrations
    initialize_schema(&pool).await?;

    Ok(pool)
}

/// Parse a stored RFC 3339 timestamp
pub(crate) fn parse_timestamp(value: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| crate::error::AppError::Internal(format!("Bad timestamp '{}': {}", value, e)))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    /// Pool backed by a file in a fresh temporary directory
    pub async fn temp_pool() -> (TempDir, SqlitePool) {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite:{}", dir.path().join("gutter.db").display());
        let pool = create_pool(&url).await.unwrap();
        (dir, pool)
    }
}
