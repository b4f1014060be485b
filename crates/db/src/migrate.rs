use sqlx::SqlitePool;
use tracing::{debug, info};

/// Ordered schema steps, never edited once released.
const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial_schema",
    include_str!("../migrations/001_initial_schema.sql"),
)];

/// Apply pending migrations in order. Each one runs in its own transaction
/// together with its `_migrations` bookkeeping row.
pub async fn run(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            applied_ts INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    let applied: Vec<(String,)> = sqlx::query_as("SELECT name FROM _migrations")
        .fetch_all(pool)
        .await?;

    for (name, sql) in MIGRATIONS {
        if applied.iter().any(|(done,)| done == name) {
            debug!(migration = name, "already applied");
            continue;
        }

        info!(migration = name, "applying migration");
        let mut tx = pool.begin().await?;
        // The schema files contain no triggers, so ';' always ends a statement.
        for statement in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        sqlx::query("INSERT INTO _migrations (name, applied_ts) VALUES (?, ?)")
            .bind(name)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_import_tables_once() {
        let pool = crate::connect(":memory:").await.unwrap();
        run(&pool).await.unwrap();
        run(&pool).await.unwrap();

        let (applied,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '\\_%' ESCAPE '\\' \
             AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["catalog_entry", "extracted_title", "import_session", "title_match"]
        );
    }
}
