//! Batch file operations for treesync.
//!
//! This crate moves, copies and deletes lists of paths with best-effort
//! semantics: the batch is validated up front, then every item is attempted
//! and reported on its own. Sidecar files travel with their primaries.
//! [`BatchEngine`] runs synchronously against a
//! [`FileSystem`](treesync_core::FileSystem); [`OperationExecutor`] runs it on
//! a blocking worker and streams progress over a channel.

mod conflict;
mod engine;
mod executor;
mod operation;
mod progress;

pub use conflict::{Conflict, ConflictKind, ConflictResolution, ConflictResolver, OverwritePolicy};
pub use engine::BatchEngine;
pub use executor::{OperationEvent, OperationExecutor, OperationHandle};
pub use operation::FileOperation;
pub use progress::{
    BatchResult, ItemOutcome, ItemReport, NoProgress, OperationType, ProgressSink, SkipReason,
};

/// Default channel buffer size for operation progress updates.
pub const OPERATION_CHANNEL_SIZE: usize = 100;
