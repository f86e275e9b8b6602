//! In-memory tree arena.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;
use crate::error::{OpError, Result};
use crate::node::{EntryInfo, NodeId, NodeKind, SortKey, TreeNode, file_name_of};
use crate::ordering::{DirsFirst, OrderingPolicy};

/// Structural or metadata change applied to the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreeEvent {
    /// A node was inserted at `index` among its parent's children.
    Inserted {
        parent: NodeId,
        node: NodeId,
        index: usize,
    },
    /// A node (and its subtree) was removed.
    Removed {
        parent: NodeId,
        node: NodeId,
        path: PathBuf,
    },
    /// A node's cached metadata changed in place.
    Updated { node: NodeId },
    /// A node's path changed; `index` is its new position.
    Relocated {
        node: NodeId,
        from: PathBuf,
        to: PathBuf,
        index: usize,
    },
}

/// Synthetic root holding one or more named mount subtrees.
///
/// All structural changes go through [`insert_child`](Self::insert_child),
/// [`remove`](Self::remove), [`clear_children`](Self::clear_children) and
/// [`relocate`](Self::relocate), which keep every child list sorted under
/// the tree's ordering policy.
#[derive(Debug)]
pub struct FileTree {
    nodes: HashMap<NodeId, TreeNode>,
    mounts: Vec<NodeId>,
    ordering: Arc<dyn OrderingPolicy>,
    next_id: u64,
    events: Vec<TreeEvent>,
}

impl FileTree {
    /// Create an empty tree with the given ordering.
    pub fn new(ordering: Arc<dyn OrderingPolicy>) -> Self {
        Self {
            nodes: HashMap::new(),
            mounts: Vec::new(),
            ordering,
            next_id: 0,
            events: Vec::new(),
        }
    }

    /// Create a tree with its mounts as described by a config.
    ///
    /// Mount roots start out as unloaded directories; the first refresh
    /// checks them against the file system.
    pub fn from_config(config: &SyncConfig) -> Self {
        let mut tree = Self::new(config.ordering());
        for mount in &config.mounts {
            tree.add_mount(&mount.name, &mount.path);
        }
        tree
    }

    /// Add a named mount root.
    pub fn add_mount(&mut self, name: &str, path: impl Into<PathBuf>) -> NodeId {
        let id = self.allocate();
        let mut node = TreeNode::from_entry(id, None, EntryInfo::new(path, NodeKind::Directory, None));
        node.display_name = Some(CompactString::new(name));
        self.nodes.insert(id, node);
        self.mounts.push(id);
        id
    }

    /// Mount roots in display order.
    pub fn mounts(&self) -> &[NodeId] {
        &self.mounts
    }

    /// Find a mount root by its display name.
    pub fn mount_named(&self, name: &str) -> Option<NodeId> {
        self.mounts
            .iter()
            .copied()
            .find(|id| self.nodes.get(id).is_some_and(|n| n.display_name() == name))
    }

    /// The mount whose path equals or contains `path` (deepest wins).
    pub fn mount_for(&self, path: &Path) -> Option<NodeId> {
        self.mounts
            .iter()
            .copied()
            .filter(|id| self.nodes.get(id).is_some_and(|n| path.starts_with(&n.path)))
            .max_by_key(|id| self.nodes[id].path.components().count())
    }

    /// Whether the id anchors a mount.
    pub fn is_mount_root(&self, id: NodeId) -> bool {
        self.mounts.contains(&id)
    }

    /// Get a node.
    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(&id)
    }

    /// Get a node or fail with [`OpError::UnknownNode`].
    pub fn node(&self, id: NodeId) -> Result<&TreeNode> {
        self.nodes.get(&id).ok_or_else(|| OpError::unknown_node(id))
    }

    /// Whether the id is live in this tree.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of materialized nodes, mount roots included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no nodes at all.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Children of a node in display order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(&id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Children of a node as node references.
    pub fn child_nodes(&self, id: NodeId) -> impl Iterator<Item = &TreeNode> + '_ {
        self.children(id).iter().filter_map(|c| self.nodes.get(c))
    }

    /// Parent of a node.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    /// The chain of ids from the mount root down to `id`, inclusive.
    pub fn chain(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current.and_then(|c| self.nodes.get(&c)) {
            chain.push(node.id);
            current = node.parent;
        }
        chain.reverse();
        chain
    }

    /// Locate an already materialized node by path. Does not touch disk.
    pub fn find_by_path(&self, path: &Path) -> Option<NodeId> {
        let mount = self.mount_for(path)?;
        let root = &self.nodes[&mount].path;
        let rest = path.strip_prefix(root).ok()?;
        let mut current = mount;
        for component in rest.components() {
            let name = component.as_os_str();
            current = self
                .child_nodes(current)
                .find(|c| c.path.file_name() == Some(name))?
                .id;
        }
        Some(current)
    }

    /// Binary search a node's children for a key.
    ///
    /// `Ok(index)` is an exact match, `Err(index)` the insertion point.
    pub fn search_children(&self, parent: NodeId, key: &SortKey<'_>) -> std::result::Result<usize, usize> {
        self.children(parent)
            .binary_search_by(|child| self.ordering.compare(&self.nodes[child].sort_key(), key))
    }

    /// Whether a node's children are in strictly ascending order.
    pub fn is_sorted(&self, id: NodeId) -> bool {
        self.children(id).windows(2).all(|pair| {
            self.ordering
                .compare(&self.nodes[&pair[0]].sort_key(), &self.nodes[&pair[1]].sort_key())
                .is_lt()
        })
    }

    /// Insert a listed entry under `parent`, or update the existing child
    /// with the same key in place. Returns the child's id.
    pub fn insert_child(&mut self, parent: NodeId, entry: EntryInfo) -> Result<NodeId> {
        self.node(parent)?;
        let name = file_name_of(&entry.path);
        let key = SortKey::for_entry(&entry, &name);
        let (existing, index) = match self.search_children(parent, &key) {
            Ok(index) => (Some(self.children(parent)[index]), index),
            Err(index) => {
                // A directory/file flip changes the key, so look under the old kind too.
                let flipped = SortKey {
                    is_dir: !key.is_dir,
                    ..key
                };
                let existing = self
                    .search_children(parent, &flipped)
                    .ok()
                    .map(|i| self.children(parent)[i]);
                (existing, index)
            }
        };

        if let Some(id) = existing {
            self.update(id, entry.kind, entry.modified)?;
            return Ok(id);
        }

        let id = self.allocate();
        self.nodes
            .insert(id, TreeNode::from_entry(id, Some(parent), entry));
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.insert(index, id);
        }
        self.events.push(TreeEvent::Inserted {
            parent,
            node: id,
            index,
        });
        Ok(id)
    }

    /// Update a node's cached metadata in place.
    ///
    /// A kind change between directory and file moves the node in sort
    /// order, so such a change repositions it.
    pub fn update(&mut self, id: NodeId, kind: NodeKind, modified: Option<SystemTime>) -> Result<bool> {
        let node = self.nodes.get_mut(&id).ok_or_else(|| OpError::unknown_node(id))?;
        let was_dir = node.is_dir();
        if !node.apply(kind, modified) {
            return Ok(false);
        }
        if !kind.is_dir() {
            self.clear_children(id)?;
        }
        if was_dir != kind.is_dir() {
            self.reposition(id)?;
        }
        self.events.push(TreeEvent::Updated { node: id });
        Ok(true)
    }

    /// Remove a node and its whole subtree. Mount roots cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> Result<TreeNode> {
        self.node(id)?;
        let parent = self
            .parent(id)
            .ok_or_else(|| OpError::invalid_target(self.path_of(id), "Mount roots cannot be removed"))?;
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|c| *c != id);
        }
        let node = self.drop_subtree(id).ok_or_else(|| OpError::unknown_node(id))?;
        self.events.push(TreeEvent::Removed {
            parent,
            node: id,
            path: node.path.clone(),
        });
        Ok(node)
    }

    /// Remove every child of a node.
    pub fn clear_children(&mut self, id: NodeId) -> Result<()> {
        let children = self.node(id)?.children.clone();
        for child in children {
            self.remove(child)?;
        }
        Ok(())
    }

    /// Mark a node's children as synchronized.
    pub fn mark_loaded(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.loaded = true;
        }
    }

    /// Point a node at a new path, rewrite every descendant's cached path by
    /// prefix substitution and move the node to its new sorted position.
    pub fn relocate(&mut self, id: NodeId, new_path: PathBuf) -> Result<()> {
        let old_path = self.node(id)?.path.clone();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get_mut(&current) else {
                continue;
            };
            let rewritten = match node.path.strip_prefix(&old_path) {
                Ok(suffix) if !suffix.as_os_str().is_empty() => new_path.join(suffix),
                _ => new_path.clone(),
            };
            node.path = rewritten;
            node.name = file_name_of(&node.path);
            stack.extend(node.children.iter().copied());
        }
        let index = self.reposition(id)?;
        self.events.push(TreeEvent::Relocated {
            node: id,
            from: old_path,
            to: new_path,
            index,
        });
        Ok(())
    }

    /// Drain the events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<TreeEvent> {
        std::mem::take(&mut self.events)
    }

    /// All ids in the subtree below `id` (not including `id`), depth first.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    fn path_of(&self, id: NodeId) -> PathBuf {
        self.nodes.get(&id).map(|n| n.path.clone()).unwrap_or_default()
    }

    fn allocate(&mut self) -> NodeId {
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Move a node to the sorted position its current key calls for.
    fn reposition(&mut self, id: NodeId) -> Result<usize> {
        let Some(parent) = self.parent(id) else {
            return Ok(self.mounts.iter().position(|m| *m == id).unwrap_or(0));
        };
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|c| *c != id);
        }
        let node = self.node(id)?;
        let index = match self.search_children(parent, &node.sort_key()) {
            Ok(index) | Err(index) => index,
        };
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.insert(index, id);
        }
        Ok(index)
    }

    fn drop_subtree(&mut self, id: NodeId) -> Option<TreeNode> {
        for child in self.descendants(id) {
            self.nodes.remove(&child);
        }
        self.nodes.remove(&id)
    }
}

impl Default for FileTree {
    fn default() -> Self {
        Self::new(Arc::new(DirsFirst))
    }
}
