//! Background processing of one uploaded title list.
//!
//! `pending → processing → completed`, or `failed` with the error recorded.
//! Only `pending` sessions are claimed, so a task delivered twice runs once.

use std::sync::Arc;
use std::time::Duration;

use showbuff_core::types::ImportStatus;
use showbuff_db::repo::{extracted_titles, imports, title_matches};
use showbuff_extract::{ExtractError, ExtractedRecord};
use showbuff_metadata::MetadataError;
use showbuff_metadata::matcher;
use showbuff_metadata::remote::RemoteMetadataClient;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::queue::{ImportInput, ImportTask};
use crate::state::ServerEvent;

#[derive(Debug, thiserror::Error)]
pub enum ImportJobError {
    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),
    #[error("matching failed: {0}")]
    Matching(#[from] MetadataError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("extraction task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Handles the worker needs; cheap to clone.
#[derive(Clone)]
pub struct ImportJobContext {
    pub db: SqlitePool,
    pub remote: Arc<RemoteMetadataClient>,
    pub events: broadcast::Sender<ServerEvent>,
}

impl ImportJobContext {
    fn emit(&self, event: ServerEvent) {
        // No subscribers is the common case; progress is best-effort.
        if self.events.send(event).is_err() {
            debug!("no event subscribers");
        }
    }

    fn emit_status(&self, import_id: &str, status: ImportStatus, error: Option<String>) {
        self.emit(ServerEvent::ImportStatus {
            import_id: import_id.to_string(),
            status: status.as_str().to_string(),
            error,
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Completed { total: u64, matched: u64 },
    Failed(String),
    /// The session was unknown or no longer pending.
    Skipped,
}

/// Process one queued import end to end, then drop its temporary input.
pub async fn run_import(ctx: &ImportJobContext, task: ImportTask) -> ImportOutcome {
    let outcome = claim_and_process(ctx, &task).await;
    cleanup_input(&task.input).await;
    outcome
}

async fn claim_and_process(ctx: &ImportJobContext, task: &ImportTask) -> ImportOutcome {
    let import_id = task.import_id.as_str();

    match imports::claim_pending(&ctx.db, import_id).await {
        Ok(true) => {}
        Ok(false) => {
            warn!(import_id, "import is unknown or not pending, skipping");
            return ImportOutcome::Skipped;
        }
        Err(e) => {
            error!(import_id, error = %e, "failed to claim import");
            return ImportOutcome::Failed(e.to_string());
        }
    }
    ctx.emit_status(import_id, ImportStatus::Processing, None);
    info!(
        import_id,
        list_type = task.list_type.map(|l| l.as_str()),
        user_id = task.user_id.as_deref(),
        "import started"
    );

    match process_records(ctx, task).await {
        Ok((total, matched)) => {
            info!(import_id, total, matched, "import completed");
            ctx.emit_status(import_id, ImportStatus::Completed, None);
            ImportOutcome::Completed { total, matched }
        }
        Err(e) => {
            let message = e.to_string();
            error!(import_id, error = %message, "import failed");
            if let Err(update_err) = fail_session_with_retry(&ctx.db, import_id, &message).await {
                error!(import_id, error = %update_err, "failed to set import status to failed");
            }
            ctx.emit_status(import_id, ImportStatus::Failed, Some(message.clone()));
            ImportOutcome::Failed(message)
        }
    }
}

async fn process_records(
    ctx: &ImportJobContext,
    task: &ImportTask,
) -> Result<(u64, u64), ImportJobError> {
    let import_id = task.import_id.as_str();
    let records = extract_input(&task.input).await?;
    let total = records.len() as u64;
    let mut matched = 0u64;

    for (idx, rec) in records.iter().enumerate() {
        let title = extracted_titles::insert_title(
            &ctx.db,
            import_id,
            &rec.raw_text,
            Some(&rec.normalized_title),
            rec.year.map(i64::from),
        )
        .await?;

        let matches = matcher::find_matches(
            &ctx.db,
            &ctx.remote,
            title.normalized_title.as_deref(),
            rec.year,
        )
        .await?;

        for m in &matches {
            title_matches::insert_match(
                &ctx.db,
                title.id,
                &title_matches::NewTitleMatch {
                    media_type: m.kind.as_str(),
                    external_id: Some(m.external_id),
                    local_id: Some(m.local_id),
                    confidence: m.confidence,
                    match_method: m.method.as_str(),
                    is_ambiguous: m.is_ambiguous,
                },
            )
            .await?;
        }

        if !matches.is_empty() {
            matched += 1;
        }

        ctx.emit(ServerEvent::ImportProgress {
            import_id: import_id.to_string(),
            processed: idx as u64 + 1,
            total,
            matched,
        });
    }

    imports::complete_session(&ctx.db, import_id, total as i64, matched as i64).await?;
    Ok((total, matched))
}

async fn extract_input(input: &ImportInput) -> Result<Vec<ExtractedRecord>, ImportJobError> {
    match input {
        ImportInput::Text(text) => Ok(showbuff_extract::extract_from_text(text)),
        ImportInput::File { path, .. } => {
            let path = path.clone();
            let records =
                tokio::task::spawn_blocking(move || showbuff_extract::extract_from_file(&path))
                    .await??;
            Ok(records)
        }
    }
}

async fn cleanup_input(input: &ImportInput) {
    if let ImportInput::File {
        path,
        temporary: true,
    } = input
        && let Err(e) = tokio::fs::remove_file(path).await
    {
        debug!(path = %path.display(), error = %e, "could not remove temporary upload");
    }
}

async fn fail_session_with_retry(
    pool: &SqlitePool,
    import_id: &str,
    message: &str,
) -> Result<(), sqlx::Error> {
    let mut last_err: Option<sqlx::Error> = None;
    for _ in 0..5 {
        match imports::fail_session(pool, import_id, message).await {
            Ok(_) => return Ok(()),
            Err(e) => {
                last_err = Some(e);
                tokio::time::sleep(Duration::from_millis(120)).await;
            }
        }
    }
    match last_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
