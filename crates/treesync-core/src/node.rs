//! Tree node types.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Unique identifier for a node within a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Create a new NodeId from a u64.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

/// What a node's backing path was last observed to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Directory.
    Directory,
    /// Regular file (or anything that is not a directory).
    File,
    /// Backing path no longer exists. The node is a tombstone.
    Missing,
}

impl NodeKind {
    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, NodeKind::Directory)
    }

    /// Check if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, NodeKind::File)
    }

    /// Check if this is a tombstone.
    pub fn is_missing(&self) -> bool {
        matches!(self, NodeKind::Missing)
    }
}

/// Metadata observed for one path during a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Full path of the entry.
    pub path: PathBuf,
    /// Observed kind.
    pub kind: NodeKind,
    /// Last modification time, if the file system reports one.
    pub modified: Option<SystemTime>,
}

impl EntryInfo {
    /// Create entry info.
    pub fn new(path: impl Into<PathBuf>, kind: NodeKind, modified: Option<SystemTime>) -> Self {
        Self {
            path: path.into(),
            kind,
            modified,
        }
    }

    /// Final path component, falling back to the whole path.
    pub fn name(&self) -> CompactString {
        file_name_of(&self.path)
    }
}

/// A single materialized file-system entry.
///
/// Nodes live in a [`FileTree`](crate::FileTree) arena. The parent link is a
/// plain id used for upward traversal only; the child list is owned and
/// mutated exclusively by the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    /// Unique identifier for this node.
    pub id: NodeId,

    /// Backing path.
    pub(crate) path: PathBuf,

    /// Cached final path component.
    pub(crate) name: CompactString,

    /// Label shown instead of `name` (mount roots only).
    pub(crate) display_name: Option<CompactString>,

    /// Observed kind.
    pub(crate) kind: NodeKind,

    /// Last modification time seen at refresh.
    pub(crate) last_modified: Option<SystemTime>,

    /// Whether children have been synchronized at least once.
    pub(crate) loaded: bool,

    /// Parent node (None for mount roots).
    pub(crate) parent: Option<NodeId>,

    /// Children ids, always sorted under the tree's ordering policy.
    pub(crate) children: Vec<NodeId>,
}

impl TreeNode {
    pub(crate) fn from_entry(id: NodeId, parent: Option<NodeId>, entry: EntryInfo) -> Self {
        Self {
            id,
            name: file_name_of(&entry.path),
            path: entry.path,
            display_name: None,
            kind: entry.kind,
            last_modified: entry.modified,
            loaded: false,
            parent,
            children: Vec::new(),
        }
    }

    /// Backing path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Final path component.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name to present and sort by.
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Observed kind.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Last modification time seen at refresh.
    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    /// Parent node id.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children ids in display order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Get the number of direct children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Whether children have been synchronized at least once.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Check if this node is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Check if this node is a file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Check if this node is a tombstone.
    pub fn is_missing(&self) -> bool {
        self.kind.is_missing()
    }

    /// Check if this node anchors a mount.
    pub fn is_mount_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Sort key of this node.
    pub fn sort_key(&self) -> SortKey<'_> {
        SortKey {
            is_dir: self.is_dir(),
            name: self.display_name(),
            path: &self.path,
        }
    }

    /// Apply freshly observed metadata. Returns true if anything changed.
    pub(crate) fn apply(&mut self, kind: NodeKind, modified: Option<SystemTime>) -> bool {
        let changed = self.kind != kind || self.last_modified != modified;
        self.kind = kind;
        self.last_modified = modified;
        changed
    }
}

/// The attributes an ordering policy may look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey<'a> {
    /// Directories group before everything else.
    pub is_dir: bool,
    /// Display name.
    pub name: &'a str,
    /// Backing path, used as the final tie-break.
    pub path: &'a Path,
}

impl<'a> SortKey<'a> {
    /// Build a key for a listed entry.
    pub fn for_entry(entry: &'a EntryInfo, name: &'a str) -> Self {
        Self {
            is_dir: entry.kind.is_dir(),
            name,
            path: &entry.path,
        }
    }
}

pub(crate) fn file_name_of(path: &Path) -> CompactString {
    path.file_name()
        .map(|n| CompactString::new(n.to_string_lossy()))
        .unwrap_or_else(|| CompactString::new(path.to_string_lossy()))
}
