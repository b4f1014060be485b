pub mod migrate;
pub mod repo;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

const MAX_CONNECTIONS: u32 = 5;

/// Open the importer database: WAL journal, foreign keys on (the import
/// tables rely on cascading deletes).
///
/// `:memory:` gives a fresh shared in-memory database, which the tests use.
pub async fn connect(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if db_path != ":memory:"
        && let Some(parent) = Path::new(db_path).parent().filter(|p| !p.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent).ok();
    }

    let opts = SqliteConnectOptions::from_str(db_path)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(opts)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_database_is_created_with_parent_dirs() {
        let dir = std::env::temp_dir().join(format!("showbuff_db_{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("importer.db");

        let pool = connect(path.to_str().unwrap()).await.unwrap();
        migrate::run(&pool).await.unwrap();
        assert!(path.exists());

        let (fk,): (i64,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(fk, 1);

        pool.close().await;
        std::fs::remove_dir_all(&dir).ok();
    }
}
