//! Single-node mutations: create and rename.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use treesync_core::{
    FileTree, NodeId, OpError, OpWarning, TreeEvent, WarningKind, validate_filename,
};

use crate::engine::SyncEngine;

/// Result of a successful rename.
#[derive(Debug, Clone, Serialize)]
pub struct RenameOutcome {
    /// The renamed node; its id is unchanged.
    pub node: NodeId,
    /// Path before the rename.
    pub from: PathBuf,
    /// Path after the rename.
    pub to: PathBuf,
    /// Sidecars that were renamed along with the primary.
    pub sidecars: Vec<PathBuf>,
    /// Sidecar problems that did not fail the rename.
    pub warnings: Vec<OpWarning>,
    /// Tree changes made by the rename.
    pub events: Vec<TreeEvent>,
}

impl RenameOutcome {
    /// Whether the rename was a no-op.
    pub fn is_unchanged(&self) -> bool {
        self.from == self.to
    }
}

#[derive(Debug, Clone, Copy)]
enum NewEntry {
    Directory,
    File,
}

impl SyncEngine {
    /// Create a directory named `name` under `parent` and insert its node.
    pub fn create_directory(
        &self,
        tree: &mut FileTree,
        parent: NodeId,
        name: &str,
    ) -> Result<NodeId, OpError> {
        self.create(tree, parent, name, NewEntry::Directory)
    }

    /// Create an empty file named `name` under `parent` and insert its node.
    pub fn create_file(
        &self,
        tree: &mut FileTree,
        parent: NodeId,
        name: &str,
    ) -> Result<NodeId, OpError> {
        self.create(tree, parent, name, NewEntry::File)
    }

    fn create(
        &self,
        tree: &mut FileTree,
        parent: NodeId,
        name: &str,
        entry: NewEntry,
    ) -> Result<NodeId, OpError> {
        let parent_node = tree.node(parent)?;
        let parent_path = parent_node.path().to_path_buf();
        if !parent_node.is_dir() {
            return Err(OpError::invalid_target(parent_path, "Parent is not a directory"));
        }
        validate_filename(name)
            .map_err(|reason| OpError::invalid_target(&parent_path, reason.to_string()))?;

        let path = self.fs.child_of(&parent_path, name);
        if self.fs.exists(&path) {
            return Err(OpError::AlreadyExists { path });
        }
        match entry {
            NewEntry::Directory => self.fs.create_dir(&path)?,
            NewEntry::File => self.fs.create_file(&path)?,
        }

        let id = tree.insert_child(parent, self.fs.entry_info(&path))?;
        self.publish(tree);
        info!(path = %path.display(), kind = ?entry, "created entry");
        Ok(id)
    }

    /// Rename a node within its parent directory.
    ///
    /// Sidecars of a renamed file follow it. A sidecar that cannot be
    /// renamed is reported as a warning and does not undo the primary
    /// rename. The node keeps its id; its cached path and every
    /// descendant's path are rewritten, and it moves to its new sorted
    /// position.
    pub fn rename(
        &self,
        tree: &mut FileTree,
        id: NodeId,
        new_name: &str,
    ) -> Result<RenameOutcome, OpError> {
        let node = tree.node(id)?;
        let from = node.path().to_path_buf();
        let is_file = node.is_file();

        let parent = match node.parent() {
            Some(parent) if !tree.is_mount_root(id) => parent,
            _ => return Err(OpError::invalid_target(from, "Mount roots cannot be renamed")),
        };
        validate_filename(new_name)
            .map_err(|reason| OpError::invalid_target(&from, reason.to_string()))?;

        let parent_path = tree.node(parent)?.path().to_path_buf();
        let to = self.fs.child_of(&parent_path, new_name);
        if to == from {
            return Ok(RenameOutcome {
                node: id,
                from,
                to,
                sidecars: Vec::new(),
                warnings: Vec::new(),
                events: Vec::new(),
            });
        }
        // A case-only change names the same entry on case-insensitive volumes.
        if self.fs.exists(&to) && !self.fs.same_entry(&from, &to) {
            return Err(OpError::AlreadyExists { path: to });
        }

        let sidecars = if is_file && !self.sidecars.is_sidecar(&from) {
            self.sidecars.existing(self.fs.as_ref(), &from)
        } else {
            Vec::new()
        };

        self.fs.rename(&from, &to)?;
        info!(from = %from.display(), to = %to.display(), "renamed");

        let mut moved = Vec::new();
        let mut warnings = Vec::new();
        for sidecar in sidecars {
            let follow = self.sidecars.follow(&sidecar, &from, &to);
            match self.rename_sidecar(&sidecar, &follow) {
                Ok(()) => {
                    if let Some(sidecar_node) = tree.find_by_path(&sidecar) {
                        tree.relocate(sidecar_node, follow.clone())?;
                    }
                    moved.push(follow);
                }
                Err(err) => {
                    warn!(path = %sidecar.display(), error = %err, "sidecar rename failed");
                    warnings.push(OpWarning::sidecar(WarningKind::SidecarRename, &err));
                }
            }
        }

        tree.relocate(id, to.clone())?;
        let events = self.publish(tree);

        Ok(RenameOutcome {
            node: id,
            from,
            to,
            sidecars: moved,
            warnings,
            events,
        })
    }

    fn rename_sidecar(&self, from: &Path, to: &Path) -> Result<(), OpError> {
        if self.fs.exists(to) && !self.fs.same_entry(from, to) {
            return Err(OpError::AlreadyExists {
                path: to.to_path_buf(),
            });
        }
        self.fs.rename(from, to)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use treesync_core::{AcceptAll, ErrorKind, FileSystem, MemoryFs, SidecarPolicy};

    fn setup(fs: &Arc<MemoryFs>) -> (SyncEngine, FileTree, NodeId) {
        let engine = SyncEngine::new(fs.clone(), Arc::new(AcceptAll), SidecarPolicy::default());
        let mut tree = FileTree::default();
        let root = tree.add_mount("user", "/u");
        engine.refresh(&mut tree, root).unwrap();
        (engine, tree, root)
    }

    fn child(tree: &FileTree, parent: NodeId, name: &str) -> NodeId {
        tree.child_nodes(parent)
            .find(|n| n.name() == name)
            .map(|n| n.id)
            .unwrap()
    }

    #[test]
    fn test_create_directory_inserts_sorted() {
        let fs = Arc::new(MemoryFs::new());
        fs.add_dir("/u/b").add_file("/u/a.txt", "");
        let (engine, mut tree, root) = setup(&fs);

        let id = engine.create_directory(&mut tree, root, "a").unwrap();

        assert!(fs.is_dir(Path::new("/u/a")));
        assert_eq!(tree.children(root)[0], id);
        assert!(tree.is_sorted(root));
    }

    #[test]
    fn test_create_file_existing_fails() {
        let fs = Arc::new(MemoryFs::new());
        fs.add_file("/u/a.txt", "");
        let (engine, mut tree, root) = setup(&fs);

        let err = engine.create_file(&mut tree, root, "a.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_create_invalid_name() {
        let fs = Arc::new(MemoryFs::new());
        fs.add_dir("/u");
        let (engine, mut tree, root) = setup(&fs);

        let err = engine.create_file(&mut tree, root, "a/b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTarget);
        assert!(!fs.paths().iter().any(|p| p.starts_with("/u/a")));
    }

    #[test]
    fn test_rename_carries_sidecar() {
        let fs = Arc::new(MemoryFs::new());
        fs.add_file("/u/report.aadl", "model")
            .add_file("/u/report.aadl.prefs", "prefs");
        let (engine, mut tree, root) = setup(&fs);
        let report = child(&tree, root, "report.aadl");

        let outcome = engine.rename(&mut tree, report, "summary.aadl").unwrap();

        assert!(outcome.warnings.is_empty());
        assert!(fs.exists(Path::new("/u/summary.aadl")));
        assert!(fs.exists(Path::new("/u/summary.aadl.prefs")));
        assert!(!fs.exists(Path::new("/u/report.aadl")));
        assert!(!fs.exists(Path::new("/u/report.aadl.prefs")));
        assert_eq!(outcome.node, report);
        assert_eq!(tree.node(report).unwrap().name(), "summary.aadl");
        assert!(tree.is_sorted(root));
    }

    #[test]
    fn test_rename_sidecar_conflict_is_warning() {
        let fs = Arc::new(MemoryFs::new());
        fs.add_file("/u/report.aadl", "model")
            .add_file("/u/report.aadl.prefs", "old prefs")
            .add_file("/u/summary.aadl.prefs", "stray");
        let (engine, mut tree, root) = setup(&fs);
        let report = child(&tree, root, "report.aadl");

        let outcome = engine.rename(&mut tree, report, "summary.aadl").unwrap();

        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].kind, WarningKind::SidecarRename);
        assert!(fs.exists(Path::new("/u/summary.aadl")));
        assert_eq!(fs.read("/u/summary.aadl.prefs").unwrap(), b"stray");
    }

    #[test]
    fn test_rename_rewrites_descendant_paths() {
        let fs = Arc::new(MemoryFs::new());
        fs.add_file("/u/dir/inner/deep.txt", "");
        let (engine, mut tree, root) = setup(&fs);
        let chain = engine
            .resolve_path(&mut tree, Path::new("/u/dir/inner/deep.txt"))
            .unwrap()
            .unwrap();
        let dir = chain[1];

        engine.rename(&mut tree, dir, "renamed").unwrap();

        assert_eq!(
            tree.node(chain[3]).unwrap().path(),
            Path::new("/u/renamed/inner/deep.txt")
        );
        assert_eq!(tree.children(root), &[dir]);
    }

    #[test]
    fn test_rename_existing_target_fails() {
        let fs = Arc::new(MemoryFs::new());
        fs.add_file("/u/a", "").add_file("/u/b", "");
        let (engine, mut tree, root) = setup(&fs);
        let a = child(&tree, root, "a");

        let err = engine.rename(&mut tree, a, "b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(tree.node(a).unwrap().path(), Path::new("/u/a"));
    }

    #[test]
    fn test_rename_case_variant_of_other_entry_fails() {
        let fs = Arc::new(MemoryFs::new());
        fs.add_file("/u/a", "one").add_file("/u/A", "two");
        let (engine, mut tree, root) = setup(&fs);
        let a = child(&tree, root, "a");
        let before = fs.mutation_count();

        let err = engine.rename(&mut tree, a, "A").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(fs.mutation_count(), before);
        assert_eq!(fs.read("/u/A").unwrap(), b"two");
        assert_eq!(tree.children(root).len(), 2);
    }

    #[test]
    fn test_rename_without_sidecar_touches_only_primary() {
        let fs = Arc::new(MemoryFs::new());
        fs.add_file("/u/notes.txt", "n")
            .add_file("/u/other.txt.prefs", "p");
        let (engine, mut tree, root) = setup(&fs);
        let notes = child(&tree, root, "notes.txt");
        let before = fs.mutation_count();

        let outcome = engine.rename(&mut tree, notes, "plan.txt").unwrap();

        assert!(outcome.sidecars.is_empty());
        assert!(outcome.warnings.is_empty());
        assert_eq!(fs.mutation_count(), before + 1);
        assert!(fs.exists(Path::new("/u/plan.txt")));
        assert!(fs.exists(Path::new("/u/other.txt.prefs")));
        assert!(!fs.exists(Path::new("/u/plan.txt.prefs")));
    }

    #[test]
    fn test_rename_mount_root_rejected() {
        let fs = Arc::new(MemoryFs::new());
        fs.add_dir("/u");
        let (engine, mut tree, root) = setup(&fs);

        let err = engine.rename(&mut tree, root, "v").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTarget);
    }

    #[test]
    fn test_rename_same_name_is_noop() {
        let fs = Arc::new(MemoryFs::new());
        fs.add_file("/u/a", "");
        let (engine, mut tree, root) = setup(&fs);
        let a = child(&tree, root, "a");
        let before = fs.mutation_count();

        let outcome = engine.rename(&mut tree, a, "a").unwrap();
        assert!(outcome.is_unchanged());
        assert_eq!(fs.mutation_count(), before);
    }
}
