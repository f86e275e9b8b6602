//! Progress reporting and batch result types.

use std::path::{Path, PathBuf};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::Display;

use treesync_core::{ErrorKind, OpError, OpWarning};

/// The type of batch being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum OperationType {
    Copy,
    Move,
    Delete,
}

impl OperationType {
    fn past_tense(self) -> &'static str {
        match self {
            Self::Copy => "Copied",
            Self::Move => "Moved",
            Self::Delete => "Deleted",
        }
    }
}

/// Why an item was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum SkipReason {
    /// The batch was cancelled or aborted before this item.
    Cancelled,
    /// The target name was taken and the policy said to skip.
    Conflict,
}

/// Final state of one source item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemOutcome {
    Succeeded,
    Failed(ErrorKind),
    Skipped(SkipReason),
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl std::fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "ok"),
            Self::Failed(kind) => write!(f, "failed ({kind})"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
        }
    }
}

/// Result of one source item.
#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
    /// The source as given (after deduplication).
    pub source: PathBuf,
    /// Where the item ended up, for successful copies and moves.
    pub destination: Option<PathBuf>,
    pub outcome: ItemOutcome,
    /// The error behind a `Failed` outcome, or `Cancelled` for items the
    /// batch never reached.
    pub error: Option<OpError>,
    /// Sidecar problems that did not fail the item.
    pub warnings: Vec<OpWarning>,
    /// Bytes copied for this item.
    pub bytes: u64,
}

impl ItemReport {
    pub(crate) fn new(source: PathBuf) -> Self {
        Self {
            source,
            destination: None,
            outcome: ItemOutcome::Succeeded,
            error: None,
            warnings: Vec::new(),
            bytes: 0,
        }
    }

    pub(crate) fn skipped(source: PathBuf, reason: SkipReason) -> Self {
        Self {
            outcome: ItemOutcome::Skipped(reason),
            ..Self::new(source)
        }
    }

    pub(crate) fn cancelled(source: PathBuf) -> Self {
        Self {
            outcome: ItemOutcome::Skipped(SkipReason::Cancelled),
            error: Some(OpError::Cancelled {
                path: source.clone(),
            }),
            ..Self::new(source)
        }
    }

    pub(crate) fn failed(source: PathBuf, error: OpError) -> Self {
        Self {
            outcome: ItemOutcome::Failed(error.kind()),
            error: Some(error),
            ..Self::new(source)
        }
    }
}

/// Result of a completed batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    /// The type of operation.
    pub operation: OperationType,
    /// Target directory of a copy or move.
    pub target: Option<PathBuf>,
    /// One report per source item, in execution order.
    pub items: Vec<ItemReport>,
    /// File count reported before execution.
    pub total_files: usize,
}

impl BatchResult {
    pub(crate) fn new(operation: OperationType, target: Option<PathBuf>) -> Self {
        Self {
            operation,
            target,
            items: Vec::new(),
            total_files: 0,
        }
    }

    /// Number of items that succeeded.
    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Succeeded))
    }

    /// Number of items that failed.
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Failed(_)))
    }

    /// Number of items that were not attempted.
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Skipped(_)))
    }

    /// Total bytes copied.
    pub fn bytes_processed(&self) -> u64 {
        self.items.iter().map(|i| i.bytes).sum()
    }

    /// Failed items with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &OpError)> + '_ {
        self.items
            .iter()
            .filter(|i| matches!(i.outcome, ItemOutcome::Failed(_)))
            .filter_map(|i| i.error.as_ref().map(|e| (i.source.as_path(), e)))
    }

    /// Warnings across all items.
    pub fn warnings(&self) -> impl Iterator<Item = &OpWarning> + '_ {
        self.items.iter().flat_map(|i| i.warnings.iter())
    }

    /// Check if every item succeeded.
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.skipped() == 0
    }

    /// Directories whose listings changed, for the caller's post-batch refresh.
    pub fn affected_parents(&self) -> Vec<PathBuf> {
        let changed = self.items.iter().filter(|i| i.outcome.is_success());
        let sources = changed
            .clone()
            .filter(|_| self.operation != OperationType::Copy)
            .filter_map(|i| i.source.parent().map(Path::to_path_buf));
        let target = self
            .target
            .iter()
            .filter(|_| changed.clone().next().is_some())
            .cloned();
        sources.chain(target).unique().collect()
    }

    /// Get a human-readable summary of the batch.
    pub fn summary(&self) -> String {
        let mut summary = format!("{} {} items", self.operation.past_tense(), self.succeeded());
        if self.failed() > 0 {
            summary.push_str(&format!(", {} failed", self.failed()));
        }
        if self.skipped() > 0 {
            summary.push_str(&format!(", {} skipped", self.skipped()));
        }
        summary
    }

    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.outcome)).count()
    }
}

/// Receives progress from a running batch and answers cancellation polls.
///
/// All methods have no-op defaults.
pub trait ProgressSink: Send + Sync {
    /// Recursive file count, reported once before execution.
    fn on_total_known(&self, _files: usize) {}

    /// A top-level item is about to be processed.
    fn on_item_start(&self, _path: &Path) {}

    /// A top-level item has reached its final outcome.
    fn on_item_done(&self, _path: &Path, _outcome: &ItemOutcome) {}

    /// One file inside an item was copied.
    fn on_file_copied(&self, _path: &Path, _bytes: u64) {}

    /// Polled before each top-level item.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Sink that ignores progress and never cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(source: &str, outcome: ItemOutcome) -> ItemReport {
        ItemReport {
            outcome,
            ..ItemReport::new(source.into())
        }
    }

    #[test]
    fn test_summary() {
        let mut result = BatchResult::new(OperationType::Delete, None);
        result.items.push(report("/a/1", ItemOutcome::Succeeded));
        result.items.push(report("/a/2", ItemOutcome::Failed(ErrorKind::PermissionDenied)));
        result.items.push(report("/a/3", ItemOutcome::Skipped(SkipReason::Cancelled)));

        assert_eq!(result.summary(), "Deleted 1 items, 1 failed, 1 skipped");
        assert!(!result.is_success());
    }

    #[test]
    fn test_cancelled_items_are_not_failures() {
        let mut result = BatchResult::new(OperationType::Delete, None);
        result.items.push(ItemReport::cancelled("/a/1".into()));
        result
            .items
            .push(ItemReport::failed("/a/2".into(), OpError::NotFound { path: "/a/2".into() }));

        let cancelled = result.items[0].error.as_ref().unwrap();
        assert_eq!(cancelled.kind(), ErrorKind::Cancelled);
        let failures: Vec<_> = result.failures().map(|(path, _)| path).collect();
        assert_eq!(failures, vec![Path::new("/a/2")]);
    }

    #[test]
    fn test_affected_parents_move() {
        let mut result = BatchResult::new(OperationType::Move, Some("/dst".into()));
        result.items.push(report("/a/1", ItemOutcome::Succeeded));
        result.items.push(report("/a/2", ItemOutcome::Succeeded));
        result.items.push(report("/b/3", ItemOutcome::Failed(ErrorKind::NotFound)));

        assert_eq!(
            result.affected_parents(),
            vec![PathBuf::from("/a"), PathBuf::from("/dst")]
        );
    }

    #[test]
    fn test_affected_parents_copy_only_target() {
        let mut result = BatchResult::new(OperationType::Copy, Some("/dst".into()));
        result.items.push(report("/a/1", ItemOutcome::Succeeded));

        assert_eq!(result.affected_parents(), vec![PathBuf::from("/dst")]);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(ItemOutcome::Succeeded.to_string(), "ok");
        assert_eq!(
            ItemOutcome::Skipped(SkipReason::Conflict).to_string(),
            "skipped (Conflict)"
        );
    }
}
