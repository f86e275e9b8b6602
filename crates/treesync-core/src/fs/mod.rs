//! File system adapter.
//!
//! Everything treesync knows about the real world goes through the
//! [`FileSystem`] trait. [`LocalFs`] talks to the disk; [`MemoryFs`] keeps a
//! private in-memory hierarchy and can inject failures.

mod local;
mod memory;

use std::fmt::Debug;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use crate::error::Result;
use crate::filter::EntryFilter;
use crate::node::{EntryInfo, NodeKind};

pub use local::LocalFs;
pub use memory::MemoryFs;

/// Existence, listing and mutation primitives over abstract paths.
///
/// Implementations report failures as typed errors and never retry.
pub trait FileSystem: Send + Sync + Debug {
    /// Whether anything exists at the path.
    fn exists(&self, path: &Path) -> bool;

    /// Whether the path is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Whether the path is a regular file.
    fn is_file(&self, path: &Path) -> bool;

    /// Last modification time, if known.
    fn last_modified(&self, path: &Path) -> Option<SystemTime>;

    /// Size in bytes of a file (0 for directories and missing paths).
    fn file_size(&self, path: &Path) -> u64;

    /// Direct children of a directory that pass the filter.
    fn list_children(&self, path: &Path, filter: &dyn EntryFilter) -> Result<Vec<PathBuf>>;

    /// Create a single directory. The parent must exist.
    fn create_dir(&self, path: &Path) -> Result<()>;

    /// Create an empty file. Fails if the path exists.
    fn create_file(&self, path: &Path) -> Result<()>;

    /// Copy one regular file, returning the number of bytes copied.
    fn copy_file(&self, from: &Path, to: &Path) -> Result<u64>;

    /// Rename or move a path within the file system.
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Delete a file, or a directory with everything below it.
    fn delete(&self, path: &Path) -> Result<()>;

    /// Move a path to the trash. Defaults to a permanent delete.
    fn trash(&self, path: &Path) -> Result<()> {
        self.delete(path)
    }

    /// Whether a native rename can move `path` into `target_dir`.
    fn same_volume(&self, _path: &Path, _target_dir: &Path) -> bool {
        true
    }

    /// Whether two paths name the same on-disk entry, e.g. case variants on
    /// a case-insensitive volume. Missing paths never match.
    fn same_entry(&self, a: &Path, b: &Path) -> bool {
        a == b && self.exists(a)
    }

    /// Observed kind and timestamp of a path.
    fn entry_info(&self, path: &Path) -> EntryInfo {
        let kind = if self.is_dir(path) {
            NodeKind::Directory
        } else if self.exists(path) {
            NodeKind::File
        } else {
            NodeKind::Missing
        };
        EntryInfo::new(path, kind, self.last_modified(path))
    }

    /// Whether `path` lies strictly below `ancestor`.
    fn is_descendant_of(&self, path: &Path, ancestor: &Path) -> bool {
        path != ancestor && path.starts_with(ancestor)
    }

    /// Resolve `.` and `..` components lexically, without touching the disk.
    fn normalize(&self, path: &Path) -> PathBuf {
        let mut out = PathBuf::new();
        for component in path.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => match out.components().next_back() {
                    Some(Component::Normal(_)) => {
                        out.pop();
                    }
                    Some(Component::RootDir | Component::Prefix(_)) => {}
                    _ => out.push(".."),
                },
                other => out.push(other),
            }
        }
        out
    }

    /// Parent directory of a path.
    fn parent_of(&self, path: &Path) -> Option<PathBuf> {
        path.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
    }

    /// Path of a named child.
    fn child_of(&self, path: &Path, name: &str) -> PathBuf {
        path.join(name)
    }
}
