use sqlx::SqlitePool;

#[derive(Debug, Clone)]
pub struct ExtractedTitleRow {
    pub id: i64,
    pub import_id: String,
    pub raw_text: String,
    pub normalized_title: Option<String>,
    pub year: Option<i64>,
}

type TitleTuple = (i64, String, String, Option<String>, Option<i64>);

pub async fn insert_title(
    pool: &SqlitePool,
    import_id: &str,
    raw_text: &str,
    normalized_title: Option<&str>,
    year: Option<i64>,
) -> Result<ExtractedTitleRow, sqlx::Error> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO extracted_title (import_id, raw_text, normalized_title, year) \
         VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(import_id)
    .bind(raw_text)
    .bind(normalized_title)
    .bind(year)
    .fetch_one(pool)
    .await?;

    Ok(ExtractedTitleRow {
        id,
        import_id: import_id.to_string(),
        raw_text: raw_text.to_string(),
        normalized_title: normalized_title.map(String::from),
        year,
    })
}

pub async fn get_title(
    pool: &SqlitePool,
    title_id: i64,
) -> Result<Option<ExtractedTitleRow>, sqlx::Error> {
    let row: Option<TitleTuple> = sqlx::query_as(
        "SELECT id, import_id, raw_text, normalized_title, year FROM extracted_title WHERE id = ?",
    )
    .bind(title_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(row_to_title))
}

/// All titles of an import in extraction order.
pub async fn list_for_import(
    pool: &SqlitePool,
    import_id: &str,
) -> Result<Vec<ExtractedTitleRow>, sqlx::Error> {
    let rows: Vec<TitleTuple> = sqlx::query_as(
        "SELECT id, import_id, raw_text, normalized_title, year FROM extracted_title \
         WHERE import_id = ? ORDER BY id",
    )
    .bind(import_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_title).collect())
}

pub async fn count_for_import(pool: &SqlitePool, import_id: &str) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM extracted_title WHERE import_id = ?")
            .bind(import_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

fn row_to_title(r: TitleTuple) -> ExtractedTitleRow {
    ExtractedTitleRow {
        id: r.0,
        import_id: r.1,
        raw_text: r.2,
        normalized_title: r.3,
        year: r.4,
    }
}
