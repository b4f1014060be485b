//! In-process job queue between the upload handler and the import worker.

use std::path::PathBuf;

use showbuff_core::error::ApiError;
use showbuff_core::types::ListType;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::import_job::{self, ImportJobContext};

/// Task name imports are queued under.
pub const PROCESS_IMPORT_TASK: &str = "tasks.process_import_file";

/// Where the worker reads the uploaded titles from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportInput {
    /// Decoded text of the upload.
    Text(String),
    /// A file on disk; `temporary` files are deleted once the job ends.
    File { path: PathBuf, temporary: bool },
}

/// Everything the worker needs to process one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportTask {
    pub import_id: String,
    pub input: ImportInput,
    pub list_type: Option<ListType>,
    pub user_id: Option<String>,
}

#[derive(Debug)]
struct QueuedTask {
    name: &'static str,
    task: ImportTask,
}

/// Sending half of the queue, cloned into handler state.
#[derive(Clone)]
pub struct ImportQueue {
    tx: mpsc::UnboundedSender<QueuedTask>,
}

/// Receiving half, consumed by [`spawn_worker`].
pub struct ImportReceiver {
    rx: mpsc::UnboundedReceiver<QueuedTask>,
}

impl ImportQueue {
    pub fn new() -> (Self, ImportReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, ImportReceiver { rx })
    }

    pub fn enqueue(&self, task: ImportTask) -> Result<(), ApiError> {
        let import_id = task.import_id.clone();
        self.tx
            .send(QueuedTask {
                name: PROCESS_IMPORT_TASK,
                task,
            })
            .map_err(|_| ApiError::Internal("import worker is not running".into()))?;
        info!(import_id = %import_id, task = PROCESS_IMPORT_TASK, "import queued");
        Ok(())
    }
}

/// Run queued imports one after another until every sender is dropped.
pub fn spawn_worker(ctx: ImportJobContext, receiver: ImportReceiver) -> JoinHandle<()> {
    let mut rx = receiver.rx;
    tokio::spawn(async move {
        while let Some(queued) = rx.recv().await {
            match queued.name {
                PROCESS_IMPORT_TASK => {
                    import_job::run_import(&ctx, queued.task).await;
                }
                other => warn!(task = other, "dropping task with unknown name"),
            }
        }
        info!("import worker stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_fails_once_worker_is_gone() {
        let (queue, receiver) = ImportQueue::new();
        drop(receiver);

        let err = queue
            .enqueue(ImportTask {
                import_id: "x".into(),
                input: ImportInput::Text(String::new()),
                list_type: None,
                user_id: None,
            })
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn queued_tasks_carry_the_fixed_name() {
        let (queue, mut receiver) = ImportQueue::new();
        let task = ImportTask {
            import_id: "abc".into(),
            input: ImportInput::Text("Heat".into()),
            list_type: Some(ListType::Watchlist),
            user_id: Some("u1".into()),
        };
        queue.enqueue(task.clone()).unwrap();

        let queued = receiver.rx.recv().await.unwrap();
        assert_eq!(queued.name, PROCESS_IMPORT_TASK);
        assert_eq!(queued.task, task);
    }
}
