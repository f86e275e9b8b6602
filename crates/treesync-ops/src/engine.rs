//! Best-effort batch move, copy and delete.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexSet;
use tracing::{debug, info, warn};

use treesync_core::{
    AcceptAll, ConfigError, EntryFilter, FileSystem, OpError, OpWarning, SidecarPolicy,
    SyncConfig, WarningKind, unique_path,
};

use crate::conflict::{Conflict, ConflictKind, ConflictResolution, ConflictState, OverwritePolicy};
use crate::progress::{
    BatchResult, ItemOutcome, ItemReport, NoProgress, OperationType, ProgressSink, SkipReason,
};

/// One top-level source with the sidecars that travel with it.
#[derive(Debug, Clone)]
struct BatchItem {
    source: PathBuf,
    sidecars: Vec<PathBuf>,
    /// Sidecars that were selected as sources alongside this primary.
    folded: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transfer {
    Copy,
    Move,
}

impl Transfer {
    fn operation(self) -> OperationType {
        match self {
            Self::Copy => OperationType::Copy,
            Self::Move => OperationType::Move,
        }
    }

    fn sidecar_warning(self) -> WarningKind {
        match self {
            Self::Copy => WarningKind::SidecarCopy,
            Self::Move => WarningKind::SidecarRename,
        }
    }
}

/// Runs move, copy and delete over a list of source paths.
///
/// A batch is prechecked as a whole before anything is touched; after that
/// every item is attempted independently and gets exactly one outcome in
/// the returned [`BatchResult`]. The engine never touches a
/// [`FileTree`](treesync_core::FileTree); callers refresh
/// [`BatchResult::affected_parents`] afterwards.
pub struct BatchEngine {
    fs: Arc<dyn FileSystem>,
    filter: Arc<dyn EntryFilter>,
    sidecars: SidecarPolicy,
    mount_roots: Vec<PathBuf>,
}

impl BatchEngine {
    /// Create an engine. `mount_roots` can never be batch sources.
    pub fn new(
        fs: Arc<dyn FileSystem>,
        filter: Arc<dyn EntryFilter>,
        sidecars: SidecarPolicy,
        mount_roots: Vec<PathBuf>,
    ) -> Self {
        let mount_roots = mount_roots.iter().map(|root| fs.normalize(root)).collect();
        Self {
            fs,
            filter,
            sidecars,
            mount_roots,
        }
    }

    /// Create an engine with the filter, sidecars and mounts of a config.
    pub fn from_config(fs: Arc<dyn FileSystem>, config: &SyncConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            fs,
            Arc::new(config.filter()?),
            config.sidecars(),
            config.mount_paths(),
        ))
    }

    /// The file system this engine mutates.
    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Copy every source into `target`.
    pub fn copy_items(
        &self,
        sources: &[PathBuf],
        target: &Path,
        policy: &OverwritePolicy,
        sink: &dyn ProgressSink,
    ) -> Result<BatchResult, OpError> {
        self.transfer(Transfer::Copy, sources, target, policy, sink)
    }

    /// Move every source into `target`.
    pub fn move_items(
        &self,
        sources: &[PathBuf],
        target: &Path,
        policy: &OverwritePolicy,
        sink: &dyn ProgressSink,
    ) -> Result<BatchResult, OpError> {
        self.transfer(Transfer::Move, sources, target, policy, sink)
    }

    /// Delete every source, or move it to the trash when `use_trash` is set.
    pub fn delete_items(
        &self,
        sources: &[PathBuf],
        use_trash: bool,
        sink: &dyn ProgressSink,
    ) -> Result<BatchResult, OpError> {
        let items = self.prepare(sources);
        self.check_sources(&items, "deleted")?;

        let mut result = BatchResult::new(OperationType::Delete, None);
        if items.is_empty() {
            return Ok(result);
        }
        result.total_files = self.count_items(&items);
        sink.on_total_known(result.total_files);

        info!(items = items.len(), use_trash, "delete started");
        Ok(self.execute(result, items, sink, |item| {
            (self.delete_one(item, use_trash), false)
        }))
    }

    fn transfer(
        &self,
        transfer: Transfer,
        sources: &[PathBuf],
        target: &Path,
        policy: &OverwritePolicy,
        sink: &dyn ProgressSink,
    ) -> Result<BatchResult, OpError> {
        let items = self.prepare(sources);
        let target = self.fs.normalize(target);
        let target = target.as_path();
        let verb = match transfer {
            Transfer::Copy => "copied",
            Transfer::Move => "moved",
        };
        self.check_sources(&items, verb)?;
        self.check_target(&items, target)?;

        let mut result = BatchResult::new(transfer.operation(), Some(target.to_path_buf()));
        if items.is_empty() {
            return Ok(result);
        }
        result.total_files = self.count_items(&items);
        sink.on_total_known(result.total_files);
        self.ensure_dir(target)?;

        info!(
            operation = %transfer.operation(),
            items = items.len(),
            target = %target.display(),
            "batch started"
        );
        let mut conflicts = ConflictState::new(policy);
        Ok(self.execute(result, items, sink, |item| {
            self.transfer_one(transfer, item, target, &mut conflicts, sink)
        }))
    }

    /// Drive the per-item loop. `run` returns the item's report and whether
    /// the batch should stop after it.
    fn execute<F>(
        &self,
        mut result: BatchResult,
        items: Vec<BatchItem>,
        sink: &dyn ProgressSink,
        mut run: F,
    ) -> BatchResult
    where
        F: FnMut(&BatchItem) -> (ItemReport, bool),
    {
        let mut halted = false;
        for item in items {
            if !halted && sink.is_cancelled() {
                info!(path = %item.source.display(), "batch cancelled");
                halted = true;
            }
            let report = if halted {
                ItemReport::cancelled(item.source.clone())
            } else {
                sink.on_item_start(&item.source);
                let (report, stop) = run(&item);
                halted = stop;
                report
            };
            if let (ItemOutcome::Failed(_), Some(err)) = (report.outcome, &report.error) {
                warn!(path = %report.source.display(), error = %err, "item failed");
            }
            let folded: Vec<ItemReport> = item
                .folded
                .iter()
                .map(|sidecar| self.folded_report(&report, sidecar))
                .collect();
            for report in std::iter::once(report).chain(folded) {
                sink.on_item_done(&report.source, &report.outcome);
                result.items.push(report);
            }
        }
        info!(summary = %result.summary(), "batch finished");
        result
    }

    /// Normalize and deduplicate sources, then attach sidecars. A sidecar
    /// selected next to its primary is folded into the primary's item.
    fn prepare(&self, sources: &[PathBuf]) -> Vec<BatchItem> {
        let unique: IndexSet<PathBuf> = sources.iter().map(|s| self.fs.normalize(s)).collect();
        let mut items: Vec<BatchItem> = Vec::with_capacity(unique.len());
        let mut folded = Vec::new();
        for source in &unique {
            let primary = self
                .sidecars
                .primaries_of(source)
                .into_iter()
                .find(|primary| primary != source && unique.contains(primary));
            match primary {
                Some(primary) => folded.push((primary, source.clone())),
                None => items.push(self.item(source.clone())),
            }
        }
        for (primary, sidecar) in folded {
            match items.iter_mut().find(|item| item.source == primary) {
                Some(item) => item.folded.push(sidecar),
                None => items.push(self.item(sidecar)),
            }
        }
        items
    }

    fn item(&self, source: PathBuf) -> BatchItem {
        BatchItem {
            sidecars: self.sidecars.existing(self.fs.as_ref(), &source),
            source,
            folded: Vec::new(),
        }
    }

    /// Report for a selected sidecar that travelled with its primary. It
    /// shares the primary's outcome unless carrying it raised a warning.
    fn folded_report(&self, primary: &ItemReport, sidecar: &Path) -> ItemReport {
        let sidecar = sidecar.to_path_buf();
        match primary.outcome {
            ItemOutcome::Skipped(SkipReason::Cancelled) => ItemReport::cancelled(sidecar),
            ItemOutcome::Skipped(reason) => ItemReport::skipped(sidecar, reason),
            ItemOutcome::Failed(_) => {
                let err = primary
                    .error
                    .clone()
                    .unwrap_or_else(|| OpError::failed(&sidecar, "Primary item failed"));
                ItemReport::failed(sidecar, err)
            }
            ItemOutcome::Succeeded => {
                let destination = primary
                    .destination
                    .as_ref()
                    .map(|dest| self.sidecars.follow(&sidecar, &primary.source, dest));
                let warning = primary
                    .warnings
                    .iter()
                    .find(|w| w.path == sidecar || Some(&w.path) == destination.as_ref());
                match warning {
                    Some(warning) => {
                        let err = OpError::failed(&sidecar, &warning.message);
                        ItemReport::failed(sidecar, err)
                    }
                    None => ItemReport {
                        destination,
                        ..ItemReport::new(sidecar)
                    },
                }
            }
        }
    }

    fn check_sources(&self, items: &[BatchItem], verb: &str) -> Result<(), OpError> {
        match items
            .iter()
            .find(|item| self.mount_roots.contains(&item.source))
        {
            Some(item) => Err(OpError::invalid_target(
                &item.source,
                format!("Mount roots cannot be {verb}"),
            )),
            None => Ok(()),
        }
    }

    fn check_target(&self, items: &[BatchItem], target: &Path) -> Result<(), OpError> {
        for item in items {
            if target == item.source || self.fs.is_descendant_of(target, &item.source) {
                return Err(OpError::invalid_target(
                    target,
                    format!("Target is inside source {}", item.source.display()),
                ));
            }
        }
        if self.fs.exists(target) && !self.fs.is_dir(target) {
            return Err(OpError::invalid_target(target, "Target is not a directory"));
        }
        Ok(())
    }

    fn transfer_one(
        &self,
        transfer: Transfer,
        item: &BatchItem,
        target: &Path,
        conflicts: &mut ConflictState<'_>,
        sink: &dyn ProgressSink,
    ) -> (ItemReport, bool) {
        let source = &item.source;
        if !self.fs.exists(source) {
            let err = OpError::NotFound {
                path: source.clone(),
            };
            return (ItemReport::failed(source.clone(), err), false);
        }
        let Some(name) = source.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            let err = OpError::invalid_target(source, "Source has no file name");
            return (ItemReport::failed(source.clone(), err), false);
        };

        let mut dest = self.fs.child_of(target, &name);
        let mut overwrite = false;
        if self.fs.parent_of(source).as_deref() == Some(target) {
            match transfer {
                Transfer::Move => {
                    let mut report = ItemReport::new(source.clone());
                    report.destination = Some(source.clone());
                    return (report, false);
                }
                Transfer::Copy => dest = unique_path(self.fs.as_ref(), &dest),
            }
        } else if self.fs.exists(&dest) {
            if self.fs.is_descendant_of(source, &dest) {
                let err = OpError::invalid_target(&dest, "Destination contains the source");
                return (ItemReport::failed(source.clone(), err), false);
            }
            let kind = if self.fs.is_dir(&dest) {
                ConflictKind::DirectoryExists
            } else {
                ConflictKind::FileExists
            };
            let conflict = Conflict::new(source.clone(), dest.clone(), kind);
            match conflicts.resolve(&conflict) {
                ConflictResolution::Skip | ConflictResolution::SkipAll => {
                    debug!(path = %source.display(), "skipping conflict");
                    return (ItemReport::skipped(source.clone(), SkipReason::Conflict), false);
                }
                ConflictResolution::Abort => {
                    info!(path = %source.display(), "batch aborted on conflict");
                    return (ItemReport::skipped(source.clone(), SkipReason::Conflict), true);
                }
                ConflictResolution::AutoRename => dest = unique_path(self.fs.as_ref(), &dest),
                ConflictResolution::Overwrite | ConflictResolution::OverwriteAll => overwrite = true,
            }
        }

        let cleared = if overwrite {
            self.fs.delete(&dest)
        } else {
            Ok(())
        };
        let primary = cleared.and_then(|()| match transfer {
            Transfer::Copy => self.copy_tree(source, &dest, sink),
            Transfer::Move => self.move_entry(source, &dest, target, sink),
        });

        let mut report = match primary {
            Ok(bytes) => ItemReport {
                destination: Some(dest.clone()),
                bytes,
                ..ItemReport::new(source.clone())
            },
            Err(err) => return (ItemReport::failed(source.clone(), err), false),
        };

        for sidecar in &item.sidecars {
            let sidecar_dest = self.sidecars.follow(sidecar, source, &dest);
            if let Err(err) = self.transfer_sidecar(transfer, sidecar, &sidecar_dest, target, overwrite) {
                warn!(path = %sidecar.display(), error = %err, "sidecar not carried");
                report
                    .warnings
                    .push(OpWarning::sidecar(transfer.sidecar_warning(), &err));
            }
        }
        (report, false)
    }

    fn transfer_sidecar(
        &self,
        transfer: Transfer,
        sidecar: &Path,
        dest: &Path,
        target: &Path,
        overwrite: bool,
    ) -> Result<(), OpError> {
        if self.fs.exists(dest) {
            if !overwrite {
                return Err(OpError::AlreadyExists {
                    path: dest.to_path_buf(),
                });
            }
            self.fs.delete(dest)?;
        }
        match transfer {
            Transfer::Copy => self.fs.copy_file(sidecar, dest).map(|_| ()),
            Transfer::Move => self.move_entry(sidecar, dest, target, &NoProgress).map(|_| ()),
        }
    }

    fn delete_one(&self, item: &BatchItem, use_trash: bool) -> ItemReport {
        let remove = |path: &Path| {
            if use_trash {
                self.fs.trash(path)
            } else {
                self.fs.delete(path)
            }
        };

        let source = &item.source;
        if !self.fs.exists(source) {
            let err = OpError::NotFound {
                path: source.clone(),
            };
            return ItemReport::failed(source.clone(), err);
        }
        if let Err(err) = remove(source) {
            return ItemReport::failed(source.clone(), err);
        }

        let mut report = ItemReport::new(source.clone());
        for sidecar in &item.sidecars {
            if let Err(err) = remove(sidecar) {
                warn!(path = %sidecar.display(), error = %err, "sidecar not deleted");
                report
                    .warnings
                    .push(OpWarning::sidecar(WarningKind::SidecarDelete, &err));
            }
        }
        report
    }

    /// Native rename within a volume, copy-then-delete across volumes.
    fn move_entry(
        &self,
        source: &Path,
        dest: &Path,
        target: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<u64, OpError> {
        if self.fs.same_volume(source, target) {
            self.fs.rename(source, dest)?;
            return Ok(0);
        }
        debug!(source = %source.display(), dest = %dest.display(), "cross-volume move");
        let bytes = self.copy_tree(source, dest, sink)?;
        self.fs.delete(source)?;
        Ok(bytes)
    }

    /// Recursively copy a file or directory. Not atomic: a failure part way
    /// leaves what was already copied in place.
    fn copy_tree(&self, source: &Path, dest: &Path, sink: &dyn ProgressSink) -> Result<u64, OpError> {
        if !self.fs.is_dir(source) {
            let bytes = self.fs.copy_file(source, dest)?;
            sink.on_file_copied(source, bytes);
            return Ok(bytes);
        }

        self.fs.create_dir(dest)?;
        let mut bytes = 0;
        for child in self.fs.list_children(source, &AcceptAll)? {
            let Some(name) = child.file_name() else {
                continue;
            };
            let child_dest = self.fs.child_of(dest, &name.to_string_lossy());
            bytes += self.copy_tree(&child, &child_dest, sink)?;
        }
        Ok(bytes)
    }

    fn count_items(&self, items: &[BatchItem]) -> usize {
        items.iter().map(|item| self.count_files(&item.source)).sum()
    }

    /// Recursive file count under the listing filter.
    fn count_files(&self, path: &Path) -> usize {
        if self.fs.is_dir(path) {
            self.fs
                .list_children(path, self.filter.as_ref())
                .map(|children| children.iter().map(|c| self.count_files(c)).sum())
                .unwrap_or(0)
        } else if self.fs.exists(path) {
            1
        } else {
            0
        }
    }

    fn ensure_dir(&self, dir: &Path) -> Result<(), OpError> {
        if self.fs.is_dir(dir) {
            return Ok(());
        }
        if let Some(parent) = self.fs.parent_of(dir) {
            self.ensure_dir(&parent)?;
        }
        self.fs.create_dir(dir)
    }
}

impl std::fmt::Debug for BatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchEngine")
            .field("fs", &self.fs)
            .field("sidecars", &self.sidecars)
            .field("mount_roots", &self.mount_roots)
            .finish_non_exhaustive()
    }
}
