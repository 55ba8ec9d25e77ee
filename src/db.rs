//! SQLite connection pooling.
//!
//! One pool per process, shared by the request handlers and the background
//! indexing jobs. WAL journal mode keeps index-build writes from blocking
//! query-path reads.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::DbConfig;

/// Open the database, creating the file and its parent directory on first
/// connect.
pub async fn connect(db: &DbConfig) -> Result<SqlitePool> {
    if let Some(parent) = db.path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db.path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn connect_creates_missing_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let db = DbConfig {
            path: tmp.path().join("nested/data/docchat.sqlite"),
        };

        let pool = connect(&db).await.unwrap();
        sqlx::query("SELECT 1").execute(&pool).await.unwrap();
        assert!(db.path.exists());
    }
}
