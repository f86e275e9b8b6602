//! Incremental refresh of tree nodes against the file system.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, trace};

use treesync_core::{
    ConfigError, EntryFilter, FileSystem, FileTree, NodeId, NodeKind, OpError, SidecarPolicy,
    SyncConfig, TreeEvent,
};

/// Capacity of the tree event broadcast channel.
const EVENT_CHANNEL_SIZE: usize = 256;

/// Keeps [`FileTree`] nodes in step with the file system, on demand.
///
/// The engine holds no tree state of its own. Every call takes the tree by
/// `&mut`, so structural mutation is single-writer by construction.
pub struct SyncEngine {
    pub(crate) fs: Arc<dyn FileSystem>,
    pub(crate) filter: Arc<dyn EntryFilter>,
    pub(crate) sidecars: SidecarPolicy,
    events_tx: broadcast::Sender<TreeEvent>,
}

impl SyncEngine {
    /// Create an engine from its collaborators.
    pub fn new(
        fs: Arc<dyn FileSystem>,
        filter: Arc<dyn EntryFilter>,
        sidecars: SidecarPolicy,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            fs,
            filter,
            sidecars,
            events_tx,
        }
    }

    /// Create an engine with the filter and sidecar policy of a config.
    pub fn from_config(fs: Arc<dyn FileSystem>, config: &SyncConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(fs, Arc::new(config.filter()?), config.sidecars()))
    }

    /// The file system this engine reads.
    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// The listing filter.
    pub fn filter(&self) -> &Arc<dyn EntryFilter> {
        &self.filter
    }

    /// The sidecar policy.
    pub fn sidecars(&self) -> &SidecarPolicy {
        &self.sidecars
    }

    /// Subscribe to tree changes made through this engine.
    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.events_tx.subscribe()
    }

    /// Synchronize one node's direct children with the file system.
    ///
    /// Stale and filtered-out children are removed, new entries are inserted
    /// at their sorted position, and surviving children have their metadata
    /// updated in place. Descendants are not touched. A listing failure
    /// leaves the children as they were.
    pub fn refresh(&self, tree: &mut FileTree, id: NodeId) -> Result<Vec<TreeEvent>, OpError> {
        let path = tree.node(id)?.path().to_path_buf();

        let own = self.fs.entry_info(&path);
        tree.update(id, own.kind, own.modified)?;
        if own.kind != NodeKind::Directory {
            trace!(path = %path.display(), kind = ?own.kind, "refresh of non-directory");
            return Ok(self.publish(tree));
        }

        let listing = self.fs.list_children(&path, self.filter.as_ref())?;
        let snapshot: HashSet<PathBuf> = listing.iter().cloned().collect();

        let stale: Vec<NodeId> = tree
            .child_nodes(id)
            .filter(|child| !snapshot.contains(child.path()) || !self.fs.exists(child.path()))
            .map(|child| child.id)
            .collect();
        for child in stale {
            tree.remove(child)?;
        }

        for entry_path in listing {
            let info = self.fs.entry_info(&entry_path);
            if info.kind.is_missing() {
                // Vanished between listing and stat; the next refresh settles it.
                continue;
            }
            tree.insert_child(id, info)?;
        }
        tree.mark_loaded(id);

        let events = self.publish(tree);
        debug!(
            path = %path.display(),
            children = tree.children(id).len(),
            changes = events.len(),
            "refreshed node"
        );
        Ok(events)
    }

    /// Refresh a node and every descendant directory that was already loaded.
    pub fn refresh_loaded(&self, tree: &mut FileTree, id: NodeId) -> Result<Vec<TreeEvent>, OpError> {
        let mut events = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !tree.contains(current) {
                continue;
            }
            events.extend(self.refresh(tree, current)?);
            stack.extend(
                tree.child_nodes(current)
                    .filter(|child| child.is_dir() && child.is_loaded())
                    .map(|child| child.id),
            );
        }
        Ok(events)
    }

    /// Drain the tree's pending events and broadcast them.
    pub(crate) fn publish(&self, tree: &mut FileTree) -> Vec<TreeEvent> {
        let events = tree.take_events();
        for event in &events {
            let _ = self.events_tx.send(event.clone());
        }
        events
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("fs", &self.fs)
            .field("sidecars", &self.sidecars)
            .finish_non_exhaustive()
    }
}
