use sqlx::SqlitePool;

#[derive(Debug, Clone)]
pub struct TitleMatchRow {
    pub id: i64,
    pub extracted_title_id: i64,
    pub media_type: String,
    pub external_id: Option<i64>,
    pub local_id: Option<i64>,
    pub confidence: f64,
    pub match_method: Option<String>,
    pub is_ambiguous: bool,
}

#[derive(Debug, Clone)]
pub struct NewTitleMatch<'a> {
    pub media_type: &'a str,
    pub external_id: Option<i64>,
    pub local_id: Option<i64>,
    pub confidence: f64,
    pub match_method: &'a str,
    pub is_ambiguous: bool,
}

type MatchTuple = (i64, i64, String, Option<i64>, Option<i64>, f64, Option<String>, bool);

const COLUMNS: &str = "id, extracted_title_id, media_type, external_id, local_id, confidence, \
                       match_method, is_ambiguous";

pub async fn insert_match(
    pool: &SqlitePool,
    extracted_title_id: i64,
    new: &NewTitleMatch<'_>,
) -> Result<TitleMatchRow, sqlx::Error> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO title_match \
         (extracted_title_id, media_type, external_id, local_id, confidence, match_method, is_ambiguous) \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(extracted_title_id)
    .bind(new.media_type)
    .bind(new.external_id)
    .bind(new.local_id)
    .bind(new.confidence)
    .bind(new.match_method)
    .bind(new.is_ambiguous)
    .fetch_one(pool)
    .await?;

    Ok(TitleMatchRow {
        id,
        extracted_title_id,
        media_type: new.media_type.to_string(),
        external_id: new.external_id,
        local_id: new.local_id,
        confidence: new.confidence,
        match_method: Some(new.match_method.to_string()),
        is_ambiguous: new.is_ambiguous,
    })
}

pub async fn get_match(pool: &SqlitePool, match_id: i64) -> Result<Option<TitleMatchRow>, sqlx::Error> {
    let query = format!("SELECT {COLUMNS} FROM title_match WHERE id = ?");
    let row: Option<MatchTuple> = sqlx::query_as(&query)
        .bind(match_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(row_to_match))
}

pub async fn list_for_title(
    pool: &SqlitePool,
    extracted_title_id: i64,
) -> Result<Vec<TitleMatchRow>, sqlx::Error> {
    let query = format!("SELECT {COLUMNS} FROM title_match WHERE extracted_title_id = ? ORDER BY id");
    let rows: Vec<MatchTuple> = sqlx::query_as(&query)
        .bind(extracted_title_id)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(row_to_match).collect())
}

/// Every match of an import, ordered by extracted title then match id.
pub async fn list_for_import(
    pool: &SqlitePool,
    import_id: &str,
) -> Result<Vec<TitleMatchRow>, sqlx::Error> {
    let rows: Vec<MatchTuple> = sqlx::query_as(
        "SELECT m.id, m.extracted_title_id, m.media_type, m.external_id, m.local_id, \
         m.confidence, m.match_method, m.is_ambiguous \
         FROM title_match m JOIN extracted_title t ON t.id = m.extracted_title_id \
         WHERE t.import_id = ? ORDER BY m.extracted_title_id, m.id",
    )
    .bind(import_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_match).collect())
}

fn row_to_match(r: MatchTuple) -> TitleMatchRow {
    TitleMatchRow {
        id: r.0,
        extracted_title_id: r.1,
        media_type: r.2,
        external_id: r.3,
        local_id: r.4,
        confidence: r.5,
        match_method: r.6,
        is_ambiguous: r.7,
    }
}
