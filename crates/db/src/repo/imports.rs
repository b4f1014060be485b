use sqlx::SqlitePool;

#[derive(Debug, Clone)]
pub struct ImportSessionRow {
    pub id: String,
    pub user_id: Option<String>,
    pub source: String,
    pub status: String,
    pub original_filename: Option<String>,
    pub list_type: Option<String>,
    pub total_titles: i64,
    pub matched_count: i64,
    pub unmatched_count: i64,
    pub error: Option<String>,
    pub created_ts: i64,
    pub updated_ts: i64,
}

#[derive(Debug, Clone, Default)]
pub struct NewImportSession<'a> {
    pub user_id: Option<&'a str>,
    pub source: &'a str,
    pub original_filename: Option<&'a str>,
    pub list_type: Option<&'a str>,
}

type SessionTuple = (
    String,
    Option<String>,
    String,
    String,
    Option<String>,
    Option<String>,
    i64,
    i64,
    i64,
    Option<String>,
    i64,
    i64,
);

const COLUMNS: &str = "id, user_id, source, status, original_filename, list_type, total_titles, \
                       matched_count, unmatched_count, error, created_ts, updated_ts";

pub async fn create_session(
    pool: &SqlitePool,
    new: &NewImportSession<'_>,
) -> Result<ImportSessionRow, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        "INSERT INTO import_session \
         (id, user_id, source, status, original_filename, list_type, created_ts, updated_ts) \
         VALUES (?, ?, ?, 'pending', ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(new.user_id)
    .bind(new.source)
    .bind(new.original_filename)
    .bind(new.list_type)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(ImportSessionRow {
        id,
        user_id: new.user_id.map(String::from),
        source: new.source.to_string(),
        status: "pending".to_string(),
        original_filename: new.original_filename.map(String::from),
        list_type: new.list_type.map(String::from),
        total_titles: 0,
        matched_count: 0,
        unmatched_count: 0,
        error: None,
        created_ts: now,
        updated_ts: now,
    })
}

pub async fn get_session(
    pool: &SqlitePool,
    import_id: &str,
) -> Result<Option<ImportSessionRow>, sqlx::Error> {
    let query = format!("SELECT {COLUMNS} FROM import_session WHERE id = ?");
    let row: Option<SessionTuple> = sqlx::query_as(&query)
        .bind(import_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(row_to_session))
}

/// Sessions that have not completed yet, newest first, optionally for one user.
pub async fn list_unfinished(
    pool: &SqlitePool,
    user_id: Option<&str>,
) -> Result<Vec<ImportSessionRow>, sqlx::Error> {
    let query = format!(
        "SELECT {COLUMNS} FROM import_session \
         WHERE status != 'completed' AND (? IS NULL OR user_id = ?) \
         ORDER BY created_ts DESC, rowid DESC"
    );
    let rows: Vec<SessionTuple> = sqlx::query_as(&query)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(row_to_session).collect())
}

/// Move a session from `pending` to `processing`.
///
/// Returns false when the session is unknown or was already claimed, so a
/// redelivered task never processes the same upload twice.
pub async fn claim_pending(pool: &SqlitePool, import_id: &str) -> Result<bool, sqlx::Error> {
    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query(
        "UPDATE import_session SET status = 'processing', updated_ts = ? \
         WHERE id = ? AND status = 'pending'",
    )
    .bind(now)
    .bind(import_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn complete_session(
    pool: &SqlitePool,
    import_id: &str,
    total_titles: i64,
    matched_count: i64,
) -> Result<bool, sqlx::Error> {
    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query(
        "UPDATE import_session SET status = 'completed', total_titles = ?, matched_count = ?, \
         unmatched_count = ?, error = NULL, updated_ts = ? WHERE id = ?",
    )
    .bind(total_titles)
    .bind(matched_count)
    .bind(total_titles - matched_count)
    .bind(now)
    .bind(import_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn fail_session(
    pool: &SqlitePool,
    import_id: &str,
    error: &str,
) -> Result<bool, sqlx::Error> {
    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query(
        "UPDATE import_session SET status = 'failed', error = ?, updated_ts = ? WHERE id = ?",
    )
    .bind(error)
    .bind(now)
    .bind(import_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_session(pool: &SqlitePool, import_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM import_session WHERE id = ?")
        .bind(import_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn row_to_session(r: SessionTuple) -> ImportSessionRow {
    ImportSessionRow {
        id: r.0,
        user_id: r.1,
        source: r.2,
        status: r.3,
        original_filename: r.4,
        list_type: r.5,
        total_titles: r.6,
        matched_count: r.7,
        unmatched_count: r.8,
        error: r.9,
        created_ts: r.10,
        updated_ts: r.11,
    }
}
