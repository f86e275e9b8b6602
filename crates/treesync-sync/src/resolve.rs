//! Lazy path resolution.

use std::path::{Path, PathBuf};

use compact_str::CompactString;
use tracing::trace;

use treesync_core::{FileTree, NodeId, OpError};

use crate::engine::SyncEngine;

impl SyncEngine {
    /// Resolve an absolute path to its chain of nodes, from the mount root
    /// down to the target, loading intermediate directories on the way.
    ///
    /// Each directory on the way is refreshed just before its children are
    /// searched, so the result reflects the file system at call time.
    /// Returns `Ok(None)` when some segment does not exist (or is hidden by
    /// the filter), and an `InvalidTarget` error when the path lies outside
    /// every mount.
    pub fn resolve_path(
        &self,
        tree: &mut FileTree,
        target: &Path,
    ) -> Result<Option<Vec<NodeId>>, OpError> {
        let target = self.fs.normalize(target);
        let target = target.as_path();
        let (mount, segments) = self.split_at_mount(tree, target)?;

        let mut chain = vec![mount];
        let mut current = mount;
        for segment in segments.iter().rev() {
            self.refresh(tree, current)?;
            if !tree.node(current)?.is_dir() {
                return Ok(None);
            }
            let Some(next) = tree
                .child_nodes(current)
                .find(|child| child.name() == segment.as_str())
                .map(|child| child.id)
            else {
                trace!(path = %target.display(), segment = %segment, "segment not found");
                return Ok(None);
            };
            chain.push(next);
            current = next;
        }

        if segments.is_empty() && tree.node(mount)?.is_missing() {
            return Ok(None);
        }
        Ok(Some(chain))
    }

    /// Walk upward from `target` until a mount root is reached. Returns the
    /// mount and the segments below it, innermost first.
    fn split_at_mount(
        &self,
        tree: &FileTree,
        target: &Path,
    ) -> Result<(NodeId, Vec<CompactString>), OpError> {
        let mut segments = Vec::new();
        let mut current: PathBuf = target.to_path_buf();
        loop {
            if let Some(mount) = tree
                .mounts()
                .iter()
                .copied()
                .find(|id| tree.get(*id).is_some_and(|n| n.path() == current))
            {
                return Ok((mount, segments));
            }
            let name = current
                .file_name()
                .map(|n| CompactString::new(n.to_string_lossy()))
                .ok_or_else(|| OpError::invalid_target(target, "Path is outside every mount"))?;
            segments.push(name);
            current = self
                .fs
                .parent_of(&current)
                .ok_or_else(|| OpError::invalid_target(target, "Path is outside every mount"))?;
        }
    }
}
