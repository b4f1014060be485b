use std::collections::HashMap;
use std::path::{Path as FsPath, PathBuf};

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use showbuff_core::error::ApiError;
use showbuff_core::types::{ImportStatus, ListType};
use showbuff_db::repo::{extracted_titles, imports, title_matches};
use showbuff_extract::source::SourceFormat;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::confirm::{self, ConfirmRequest, ConfirmResponse};
use crate::error::{AppError, db_error};
use crate::queue::{ImportInput, ImportTask};
use crate::state::{AppState, ServerEvent, is_final_status};

const SERVICE_NAME: &str = "showbuff-importer";
const USER_ID_HEADER: &str = "x-user-id";

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/api/health", get(health))
        .nest("/api/import", import_router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn import_router() -> Router<AppState> {
    Router::new()
        .route("/file", post(upload_import_file))
        .route("/confirm", post(confirm_matches))
        .route("/matches/pending", get(list_pending_imports))
        .route("/{id}/matches", get(get_import_matches))
        .route("/{id}/events", get(import_events))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
    env: String,
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    sqlx::query("SELECT 1")
        .execute(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("database check failed: {e}")))?;

    Ok(Json(HealthResponse {
        ok: true,
        service: SERVICE_NAME,
        env: state.config.env.clone(),
    }))
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    import_id: String,
    status: &'static str,
}

#[derive(Default)]
struct UploadForm {
    file: Option<(String, Vec<u8>)>,
    list_type: Option<String>,
    source: Option<String>,
    user_id: Option<String>,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("upload exceeds the configured size limit".into()).into()
    } else {
        ApiError::BadRequest(format!("invalid multipart body: {}", e.body_text())).into()
    }
}

async fn read_upload_form(multipart: &mut Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                form.file = Some((filename, bytes.to_vec()));
            }
            "listType" => form.list_type = Some(field.text().await.map_err(multipart_error)?),
            "source" => form.source = Some(field.text().await.map_err(multipart_error)?),
            "userId" => form.user_id = Some(field.text().await.map_err(multipart_error)?),
            _ => {}
        }
    }

    Ok(form)
}

fn header_user_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Binary formats are staged on disk; everything else travels as text.
async fn stage_upload(
    upload_dir: &FsPath,
    filename: &str,
    bytes: Vec<u8>,
) -> Result<ImportInput, AppError> {
    let format = SourceFormat::from_path(FsPath::new(filename));
    if !format.is_binary() {
        return Ok(ImportInput::Text(showbuff_extract::decode_text(&bytes)));
    }

    let ext = FsPath::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    let path: PathBuf = upload_dir.join(format!("{}.{ext}", uuid::Uuid::new_v4()));

    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to create upload dir: {e}")))?;
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to store upload: {e}")))?;

    Ok(ImportInput::File {
        path,
        temporary: true,
    })
}

async fn discard_staged(input: &ImportInput) {
    if let ImportInput::File { path, .. } = input {
        let _ = tokio::fs::remove_file(path).await;
    }
}

async fn upload_import_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let form = read_upload_form(&mut multipart).await?;

    let (filename, bytes) = form
        .file
        .ok_or_else(|| ApiError::BadRequest("file is required".into()))?;
    if filename.trim().is_empty() {
        return Err(ApiError::BadRequest("empty filename".into()).into());
    }
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("empty upload".into()).into());
    }

    let list_type = match non_blank(form.list_type) {
        Some(raw) => Some(
            ListType::normalize(&raw)
                .ok_or_else(|| ApiError::BadRequest(format!("invalid listType: {raw}")))?,
        ),
        None => None,
    };
    let source = non_blank(form.source).unwrap_or_else(|| "file".to_string());
    let user_id = non_blank(form.user_id).or_else(|| header_user_id(&headers));

    let input = stage_upload(&state.config.upload_dir, &filename, bytes).await?;

    let session = match imports::create_session(
        &state.db,
        &imports::NewImportSession {
            user_id: user_id.as_deref(),
            source: &source,
            original_filename: Some(&filename),
            list_type: list_type.map(|l| l.as_str()),
        },
    )
    .await
    {
        Ok(session) => session,
        Err(e) => {
            discard_staged(&input).await;
            return Err(db_error(e));
        }
    };

    info!(
        import_id = %session.id,
        filename = %filename,
        user_id = user_id.as_deref(),
        "import session created"
    );

    let task = ImportTask {
        import_id: session.id.clone(),
        input: input.clone(),
        list_type,
        user_id,
    };
    if let Err(e) = state.queue.enqueue(task) {
        warn!(import_id = %session.id, error = %e, "could not queue import");
        discard_staged(&input).await;
        imports::fail_session(&state.db, &session.id, &e.to_string())
            .await
            .map_err(db_error)?;
        return Err(e.into());
    }

    Ok(Json(UploadResponse {
        import_id: session.id,
        status: ImportStatus::Pending.as_str(),
    }))
}

// ---------------------------------------------------------------------------
// Matches
// ---------------------------------------------------------------------------

/// Canonical form of a client-supplied import id.
fn parse_import_id(raw: &str) -> Result<String, ApiError> {
    uuid::Uuid::parse_str(raw.trim())
        .map(|id| id.to_string())
        .map_err(|_| ApiError::BadRequest(format!("invalid import id: {raw}")))
}

async fn load_session(
    state: &AppState,
    import_id: &str,
) -> Result<imports::ImportSessionRow, AppError> {
    imports::get_session(&state.db, import_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::NotFound("import not found".into()).into())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MatchResponse {
    id: i64,
    media_type: String,
    tmdb_id: Option<i64>,
    local_id: Option<i64>,
    confidence: f64,
    match_method: Option<String>,
    is_ambiguous: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtractedTitleResponse {
    id: i64,
    raw_text: String,
    normalized_title: Option<String>,
    year: Option<i64>,
    matches: Vec<MatchResponse>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportMatchesResponse {
    import_id: String,
    status: String,
    original_filename: Option<String>,
    list_type: Option<String>,
    total_titles: i64,
    matched_count: i64,
    unmatched_count: i64,
    error: Option<String>,
    titles: Vec<ExtractedTitleResponse>,
}

async fn get_import_matches(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ImportMatchesResponse>, AppError> {
    let import_id = parse_import_id(&id)?;
    let session = load_session(&state, &import_id).await?;

    let titles = extracted_titles::list_for_import(&state.db, &import_id)
        .await
        .map_err(db_error)?;
    let matches = title_matches::list_for_import(&state.db, &import_id)
        .await
        .map_err(db_error)?;

    let mut by_title: HashMap<i64, Vec<MatchResponse>> = HashMap::new();
    for m in matches {
        by_title
            .entry(m.extracted_title_id)
            .or_default()
            .push(MatchResponse {
                id: m.id,
                media_type: m.media_type,
                tmdb_id: m.external_id,
                local_id: m.local_id,
                confidence: m.confidence,
                match_method: m.match_method,
                is_ambiguous: m.is_ambiguous,
            });
    }

    let titles = titles
        .into_iter()
        .map(|t| ExtractedTitleResponse {
            matches: by_title.remove(&t.id).unwrap_or_default(),
            id: t.id,
            raw_text: t.raw_text,
            normalized_title: t.normalized_title,
            year: t.year,
        })
        .collect();

    Ok(Json(ImportMatchesResponse {
        import_id: session.id,
        status: session.status,
        original_filename: session.original_filename,
        list_type: session.list_type,
        total_titles: session.total_titles,
        matched_count: session.matched_count,
        unmatched_count: session.unmatched_count,
        error: session.error,
        titles,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PendingQuery {
    user_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PendingImportResponse {
    import_id: String,
    status: String,
    original_filename: Option<String>,
    created_at: Option<String>,
}

async fn list_pending_imports(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PendingQuery>,
) -> Result<Json<Vec<PendingImportResponse>>, AppError> {
    let user_id = non_blank(query.user_id).or_else(|| header_user_id(&headers));

    let sessions = imports::list_unfinished(&state.db, user_id.as_deref())
        .await
        .map_err(db_error)?;

    Ok(Json(
        sessions
            .into_iter()
            .map(|s| PendingImportResponse {
                import_id: s.id,
                status: s.status,
                original_filename: s.original_filename,
                created_at: chrono::DateTime::from_timestamp(s.created_ts, 0)
                    .map(|dt| dt.to_rfc3339()),
            })
            .collect(),
    ))
}

// ---------------------------------------------------------------------------
// Confirmation
// ---------------------------------------------------------------------------

async fn confirm_matches(
    State(state): State<AppState>,
    payload: Result<Json<ConfirmRequest>, JsonRejection>,
) -> Result<Json<ConfirmResponse>, AppError> {
    let Json(req) =
        payload.map_err(|e| ApiError::BadRequest(format!("invalid body: {}", e.body_text())))?;

    let raw_id = non_blank(req.import_id)
        .ok_or_else(|| ApiError::BadRequest("importId is required".into()))?;
    let import_id = parse_import_id(&raw_id)?;
    load_session(&state, &import_id).await?;

    let resp = confirm::validate_choices(&state.db, &import_id, req.choices)
        .await
        .map_err(db_error)?;

    info!(
        import_id = %import_id,
        validated = resp.validated.len(),
        invalid = resp.invalid.len(),
        "confirmation checked"
    );
    Ok(Json(resp))
}

// ---------------------------------------------------------------------------
// Progress events
// ---------------------------------------------------------------------------

async fn import_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<
    axum::response::Sse<
        impl futures::Stream<Item = Result<axum::response::sse::Event, std::convert::Infallible>>,
    >,
    AppError,
> {
    use futures::StreamExt;
    use std::time::Duration;

    let import_id = parse_import_id(&id)?;
    // Subscribe first so a status written after the session read still arrives.
    let rx = state.events.subscribe();
    let session = load_session(&state, &import_id).await?;

    let finished = is_final_status(&session.status).then(|| ServerEvent::ImportStatus {
        import_id: session.id,
        status: session.status,
        error: session.error,
    });

    let stream = import_event_stream(rx, import_id, finished).map(|item| Ok(item.into_sse()));

    Ok(axum::response::Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}

#[derive(Debug, PartialEq)]
enum ImportStreamItem {
    Event(ServerEvent),
    Lagged(u64),
}

impl ImportStreamItem {
    fn into_sse(self) -> axum::response::sse::Event {
        use axum::response::sse::Event;
        match self {
            Self::Event(evt) => Event::default()
                .event(evt.name())
                .data(serde_json::to_string(&evt).unwrap_or_default()),
            Self::Lagged(n) => Event::default()
                .event("error")
                .data(format!(r#"{{"lagged":{n}}}"#)),
        }
    }
}

/// One import's events, ending after its final status. An import that had
/// already finished yields just its stored status (`finished`).
fn import_event_stream(
    mut rx: broadcast::Receiver<ServerEvent>,
    import_id: String,
    finished: Option<ServerEvent>,
) -> impl futures::Stream<Item = ImportStreamItem> {
    async_stream::stream! {
        if let Some(evt) = finished {
            yield ImportStreamItem::Event(evt);
        } else {
            loop {
                match rx.recv().await {
                    Ok(evt) => {
                        if evt.import_id() != Some(import_id.as_str()) {
                            continue;
                        }
                        let done = evt.is_final();
                        yield ImportStreamItem::Event(evt);
                        if done {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        yield ImportStreamItem::Lagged(n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}
