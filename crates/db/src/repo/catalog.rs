use sqlx::SqlitePool;

#[derive(Debug, Clone)]
pub struct CatalogRow {
    pub id: i64,
    pub kind: String,
    pub external_id: i64,
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<i64>,
    pub popularity: Option<f64>,
    pub adult: bool,
    pub created_ts: i64,
    pub updated_ts: i64,
}

/// Fields refreshed from the remote provider on every upsert.
#[derive(Debug, Clone)]
pub struct CatalogUpsert<'a> {
    pub kind: &'a str,
    pub external_id: i64,
    pub title: &'a str,
    pub original_title: Option<&'a str>,
    pub year: Option<i64>,
    pub popularity: Option<f64>,
    pub adult: bool,
}

type CatalogTuple = (
    i64,
    String,
    i64,
    String,
    Option<String>,
    Option<i64>,
    Option<f64>,
    bool,
    i64,
    i64,
);

const COLUMNS: &str = "id, kind, external_id, title, original_title, year, popularity, adult, \
                       created_ts, updated_ts";

/// Case-insensitive exact title lookup for one kind, most popular first
/// (unknown popularity sorts last). Case folding is Unicode-aware.
pub async fn find_by_title(
    pool: &SqlitePool,
    kind: &str,
    title: &str,
    year: Option<i64>,
    limit: i64,
) -> Result<Vec<CatalogRow>, sqlx::Error> {
    let query = format!(
        "SELECT {COLUMNS} FROM catalog_entry \
         WHERE kind = ? AND title_folded = ? AND (? IS NULL OR year = ?) \
         ORDER BY popularity IS NULL, popularity DESC, id \
         LIMIT ?"
    );
    let rows: Vec<CatalogTuple> = sqlx::query_as(&query)
        .bind(kind)
        .bind(fold_title(title))
        .bind(year)
        .bind(year)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(row_to_entry).collect())
}

pub async fn get_by_external_id(
    pool: &SqlitePool,
    kind: &str,
    external_id: i64,
) -> Result<Option<CatalogRow>, sqlx::Error> {
    let query = format!("SELECT {COLUMNS} FROM catalog_entry WHERE kind = ? AND external_id = ?");
    let row: Option<CatalogTuple> = sqlx::query_as(&query)
        .bind(kind)
        .bind(external_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(row_to_entry))
}

/// Insert or refresh an entry keyed by `(kind, external_id)`. Returns the local id.
///
/// A missing year or popularity keeps whatever the row already had.
pub async fn upsert(pool: &SqlitePool, entry: &CatalogUpsert<'_>) -> Result<i64, sqlx::Error> {
    let now = chrono::Utc::now().timestamp();
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO catalog_entry \
         (kind, external_id, title, title_folded, original_title, year, popularity, adult, \
          created_ts, updated_ts) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(kind, external_id) DO UPDATE SET \
         title = excluded.title, \
         title_folded = excluded.title_folded, \
         original_title = excluded.original_title, \
         year = COALESCE(excluded.year, catalog_entry.year), \
         popularity = COALESCE(excluded.popularity, catalog_entry.popularity), \
         adult = excluded.adult, \
         updated_ts = excluded.updated_ts \
         RETURNING id",
    )
    .bind(entry.kind)
    .bind(entry.external_id)
    .bind(entry.title)
    .bind(fold_title(entry.title))
    .bind(entry.original_title)
    .bind(entry.year)
    .bind(entry.popularity)
    .bind(entry.adult)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Lookup key for titles: trimmed and lowercased with full Unicode case mapping.
pub fn fold_title(title: &str) -> String {
    title.trim().to_lowercase()
}

pub async fn count_entries(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM catalog_entry")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn row_to_entry(r: CatalogTuple) -> CatalogRow {
    CatalogRow {
        id: r.0,
        kind: r.1,
        external_id: r.2,
        title: r.3,
        original_title: r.4,
        year: r.5,
        popularity: r.6,
        adult: r.7,
        created_ts: r.8,
        updated_ts: r.9,
    }
}
