//! Async batch execution with progress reported over a channel.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use treesync_core::OpError;

use crate::OPERATION_CHANNEL_SIZE;
use crate::conflict::OverwritePolicy;
use crate::engine::BatchEngine;
use crate::operation::FileOperation;
use crate::progress::{BatchResult, ItemOutcome, ProgressSink};

/// Events sent while a batch runs.
#[derive(Debug)]
pub enum OperationEvent {
    /// Recursive file count, sent once before execution.
    TotalKnown(usize),
    /// A top-level item is being processed.
    ItemStarted(PathBuf),
    /// A top-level item reached its outcome.
    ItemDone { path: PathBuf, outcome: ItemOutcome },
    /// A file inside an item was copied.
    FileCopied { path: PathBuf, bytes: u64 },
    /// The batch completed.
    Complete(BatchResult),
    /// The batch was rejected before anything was touched.
    Failed(OpError),
}

/// Forwards engine progress to a channel from the blocking worker.
struct ChannelSink {
    tx: mpsc::Sender<OperationEvent>,
    cancel: CancellationToken,
}

impl ProgressSink for ChannelSink {
    fn on_total_known(&self, files: usize) {
        let _ = self.tx.blocking_send(OperationEvent::TotalKnown(files));
    }

    fn on_item_start(&self, path: &Path) {
        let _ = self
            .tx
            .blocking_send(OperationEvent::ItemStarted(path.to_path_buf()));
    }

    fn on_item_done(&self, path: &Path, outcome: &ItemOutcome) {
        let _ = self.tx.blocking_send(OperationEvent::ItemDone {
            path: path.to_path_buf(),
            outcome: *outcome,
        });
    }

    fn on_file_copied(&self, path: &Path, bytes: u64) {
        let _ = self.tx.blocking_send(OperationEvent::FileCopied {
            path: path.to_path_buf(),
            bytes,
        });
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// A running batch.
#[derive(Debug)]
pub struct OperationHandle {
    events: mpsc::Receiver<OperationEvent>,
    cancel: CancellationToken,
}

impl OperationHandle {
    /// Next event, or `None` once the batch has finished.
    pub async fn recv(&mut self) -> Option<OperationEvent> {
        self.events.recv().await
    }

    /// Request cancellation. Items not yet started are skipped.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this batch, e.g. for a signal handler.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drain events and return the final result.
    pub async fn wait(mut self) -> Result<BatchResult, OpError> {
        while let Some(event) = self.events.recv().await {
            match event {
                OperationEvent::Complete(result) => return Ok(result),
                OperationEvent::Failed(err) => return Err(err),
                _ => {}
            }
        }
        Err(OpError::failed(PathBuf::new(), "Operation ended without a result"))
    }
}

/// Runs batches on a blocking worker and reports progress asynchronously.
#[derive(Debug, Clone)]
pub struct OperationExecutor {
    engine: Arc<BatchEngine>,
    /// Conflict handling for copy and move.
    pub policy: OverwritePolicy,
    /// Whether deletions go to the trash.
    pub use_trash: bool,
}

impl OperationExecutor {
    /// Create an executor that skips conflicts and deletes permanently.
    pub fn new(engine: Arc<BatchEngine>) -> Self {
        Self {
            engine,
            policy: OverwritePolicy::default(),
            use_trash: false,
        }
    }

    /// Set the conflict policy.
    pub fn with_policy(mut self, policy: OverwritePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Send deletions to the trash.
    pub fn with_trash(mut self, use_trash: bool) -> Self {
        self.use_trash = use_trash;
        self
    }

    /// Execute a copy operation.
    pub fn copy(&self, sources: Vec<PathBuf>, destination: PathBuf) -> OperationHandle {
        self.execute(FileOperation::copy(sources, destination))
    }

    /// Execute a move operation.
    pub fn move_to(&self, sources: Vec<PathBuf>, destination: PathBuf) -> OperationHandle {
        self.execute(FileOperation::move_to(sources, destination))
    }

    /// Execute a delete operation.
    pub fn delete(&self, targets: Vec<PathBuf>) -> OperationHandle {
        self.execute(FileOperation::delete(targets, self.use_trash))
    }

    /// Start any batch. Must be called within a Tokio runtime.
    pub fn execute(&self, operation: FileOperation) -> OperationHandle {
        let (tx, rx) = mpsc::channel(OPERATION_CHANNEL_SIZE);
        let cancel = CancellationToken::new();
        let sink = ChannelSink {
            tx: tx.clone(),
            cancel: cancel.clone(),
        };
        let engine = self.engine.clone();
        let policy = self.policy.clone();

        tokio::spawn(async move {
            let outcome =
                tokio::task::spawn_blocking(move || run(&engine, &operation, &policy, &sink)).await;
            let event = match outcome {
                Ok(Ok(result)) => OperationEvent::Complete(result),
                Ok(Err(err)) => OperationEvent::Failed(err),
                Err(err) => OperationEvent::Failed(OpError::failed(
                    PathBuf::new(),
                    format!("Task failed: {err}"),
                )),
            };
            let _ = tx.send(event).await;
        });

        OperationHandle { events: rx, cancel }
    }
}

fn run(
    engine: &BatchEngine,
    operation: &FileOperation,
    policy: &OverwritePolicy,
    sink: &dyn ProgressSink,
) -> Result<BatchResult, OpError> {
    match operation {
        FileOperation::Copy {
            sources,
            destination,
        } => engine.copy_items(sources, destination, policy, sink),
        FileOperation::Move {
            sources,
            destination,
        } => engine.move_items(sources, destination, policy, sink),
        FileOperation::Delete { targets, use_trash } => {
            engine.delete_items(targets, *use_trash, sink)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SkipReason;
    use treesync_core::{AcceptAll, ErrorKind, FileSystem, MemoryFs, SidecarPolicy};

    fn executor(fs: &Arc<MemoryFs>) -> OperationExecutor {
        let engine = BatchEngine::new(
            fs.clone(),
            Arc::new(AcceptAll),
            SidecarPolicy::default(),
            vec![PathBuf::from("/u")],
        );
        OperationExecutor::new(Arc::new(engine))
    }

    #[tokio::test]
    async fn test_copy_reports_progress() {
        let fs = Arc::new(MemoryFs::new());
        fs.add_file("/u/src/a", "aa")
            .add_file("/u/src/d/b", "b")
            .add_dir("/u/dst");
        let mut handle = executor(&fs).copy(
            vec![PathBuf::from("/u/src/a"), PathBuf::from("/u/src/d")],
            PathBuf::from("/u/dst"),
        );

        let mut total = None;
        let mut done = 0;
        let mut copied = 0;
        let mut result = None;
        while let Some(event) = handle.recv().await {
            match event {
                OperationEvent::TotalKnown(n) => total = Some(n),
                OperationEvent::ItemDone { .. } => done += 1,
                OperationEvent::FileCopied { .. } => copied += 1,
                OperationEvent::Complete(r) => result = Some(r),
                OperationEvent::ItemStarted(_) | OperationEvent::Failed(_) => {}
            }
        }

        assert_eq!(total, Some(2));
        assert_eq!(done, 2);
        assert_eq!(copied, 2);
        let result = result.unwrap();
        assert_eq!(result.succeeded(), 2);
        assert_eq!(result.bytes_processed(), 3);
        assert!(fs.is_file(Path::new("/u/dst/d/b")));
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let fs = Arc::new(MemoryFs::new());
        fs.add_file("/u/a", "").add_file("/u/b", "");
        let handle = executor(&fs).delete(vec![PathBuf::from("/u/a"), PathBuf::from("/u/b")]);
        handle.cancel();

        let result = handle.wait().await.unwrap();

        assert_eq!(result.skipped(), 2);
        assert_eq!(
            result.items[0].outcome,
            ItemOutcome::Skipped(SkipReason::Cancelled)
        );
        assert!(fs.exists(Path::new("/u/a")));
    }

    #[tokio::test]
    async fn test_precheck_failure_event() {
        let fs = Arc::new(MemoryFs::new());
        fs.add_dir("/u/a/b");
        let handle = executor(&fs).move_to(vec![PathBuf::from("/u/a")], PathBuf::from("/u/a/b"));

        let err = handle.wait().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTarget);
    }
}
