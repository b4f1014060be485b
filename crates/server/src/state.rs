use std::sync::Arc;

use showbuff_core::types::ImportStatus;
use showbuff_metadata::remote::RemoteMetadataClient;
use sqlx::SqlitePool;

use crate::config::ImporterConfig;
use crate::import_job::ImportJobContext;
use crate::queue::ImportQueue;

/// Server-sent event types.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "type", content = "data", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    #[serde(rename = "import_progress")]
    ImportProgress {
        import_id: String,
        processed: u64,
        total: u64,
        matched: u64,
    },
    #[serde(rename = "import_status")]
    ImportStatus {
        import_id: String,
        status: String,
        error: Option<String>,
    },
    #[serde(rename = "heartbeat")]
    Heartbeat { seq: u64 },
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ImportProgress { .. } => "import_progress",
            Self::ImportStatus { .. } => "import_status",
            Self::Heartbeat { .. } => "heartbeat",
        }
    }

    /// The import this event belongs to, if any.
    pub fn import_id(&self) -> Option<&str> {
        match self {
            Self::ImportProgress { import_id, .. } | Self::ImportStatus { import_id, .. } => {
                Some(import_id)
            }
            Self::Heartbeat { .. } => None,
        }
    }

    /// Whether this is the last event an import sends.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::ImportStatus { status, .. } if is_final_status(status))
    }
}

/// `completed` and `failed` are the statuses an import never leaves.
pub fn is_final_status(status: &str) -> bool {
    status == ImportStatus::Completed.as_str() || status == ImportStatus::Failed.as_str()
}

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<ImporterConfig>,
    pub remote: Arc<RemoteMetadataClient>,
    pub events: tokio::sync::broadcast::Sender<ServerEvent>,
    pub queue: ImportQueue,
}

impl AppState {
    /// What the background worker needs to run an import.
    pub fn job_context(&self) -> ImportJobContext {
        ImportJobContext {
            db: self.db.clone(),
            remote: self.remote.clone(),
            events: self.events.clone(),
        }
    }
}
