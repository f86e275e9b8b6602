//! In-memory file system adapter.
//!
//! Used for tests, dry runs and anywhere a hermetic hierarchy is needed.
//! Individual paths can be marked as denied to simulate permission failures,
//! and subtrees can be assigned to separate volumes to force the
//! copy-then-delete move path.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime};

use crate::error::{OpError, Result};
use crate::filter::EntryFilter;
use crate::fs::FileSystem;

#[derive(Debug, Clone)]
enum Entry {
    Dir { modified: SystemTime },
    File { data: Vec<u8>, modified: SystemTime },
}

impl Entry {
    fn modified(&self) -> SystemTime {
        match self {
            Entry::Dir { modified } | Entry::File { modified, .. } => *modified,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    entries: BTreeMap<PathBuf, Entry>,
    denied: HashSet<PathBuf>,
    volumes: Vec<PathBuf>,
}

/// [`FileSystem`] kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryFs {
    state: RwLock<State>,
    clock: AtomicU64,
    mutations: AtomicU64,
}

impl MemoryFs {
    /// Create an empty file system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory and any missing ancestors.
    pub fn add_dir(&self, path: impl AsRef<Path>) -> &Self {
        let path = path.as_ref();
        let modified = self.tick();
        let mut state = self.write();
        for ancestor in path.ancestors().collect::<Vec<_>>().into_iter().rev() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            state
                .entries
                .entry(ancestor.to_path_buf())
                .or_insert(Entry::Dir { modified });
        }
        self
    }

    /// Create a file with contents, creating missing ancestors.
    pub fn add_file(&self, path: impl AsRef<Path>, data: impl Into<Vec<u8>>) -> &Self {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        let modified = self.tick();
        self.write().entries.insert(
            path.to_path_buf(),
            Entry::File {
                data: data.into(),
                modified,
            },
        );
        self
    }

    /// Make every mutation touching `path`, and listing it, fail with
    /// permission denied.
    pub fn deny(&self, path: impl AsRef<Path>) -> &Self {
        self.write().denied.insert(path.as_ref().to_path_buf());
        self
    }

    /// Lift a previous [`deny`](Self::deny).
    pub fn allow(&self, path: impl AsRef<Path>) -> &Self {
        self.write().denied.remove(path.as_ref());
        self
    }

    /// Declare a subtree as its own volume.
    pub fn add_volume(&self, root: impl AsRef<Path>) -> &Self {
        self.write().volumes.push(root.as_ref().to_path_buf());
        self
    }

    /// Contents of a file.
    pub fn read(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.read_state().entries.get(path.as_ref()) {
            Some(Entry::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    /// Every path currently present, in sorted order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.read_state().entries.keys().cloned().collect()
    }

    /// Number of successful mutating calls so far.
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }

    /// Update a path's modification time.
    pub fn touch(&self, path: impl AsRef<Path>) -> &Self {
        let modified = self.tick();
        if let Some(entry) = self.write().entries.get_mut(path.as_ref()) {
            match entry {
                Entry::Dir { modified: m } | Entry::File { modified: m, .. } => *m = modified,
            }
        }
        self
    }

    fn tick(&self) -> SystemTime {
        let n = self.clock.fetch_add(1, Ordering::SeqCst);
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000 + n)
    }

    fn mutated(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }

    fn read_state(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn volume_of(state: &State, path: &Path) -> Option<PathBuf> {
        state
            .volumes
            .iter()
            .filter(|root| path.starts_with(root))
            .max_by_key(|root| root.components().count())
            .cloned()
    }
}

impl State {
    fn check_allowed(&self, path: &Path) -> Result<()> {
        if self.denied.contains(path) {
            return Err(OpError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }

    fn require_parent_dir(&self, path: &Path) -> Result<()> {
        let parent = path.parent().unwrap_or(Path::new(""));
        match self.entries.get(parent) {
            Some(Entry::Dir { .. }) => self.check_allowed(parent),
            Some(Entry::File { .. }) => Err(OpError::failed(path, "Parent is not a directory")),
            None => Err(OpError::NotFound {
                path: parent.to_path_buf(),
            }),
        }
    }

    fn require_absent(&self, path: &Path) -> Result<()> {
        if self.entries.contains_key(path) {
            return Err(OpError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }

    fn subtree(&self, root: &Path) -> Vec<PathBuf> {
        self.entries
            .range(root.to_path_buf()..)
            .take_while(|(p, _)| p.starts_with(root))
            .map(|(p, _)| p.clone())
            .collect()
    }
}

impl FileSystem for MemoryFs {
    fn exists(&self, path: &Path) -> bool {
        self.read_state().entries.contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.read_state().entries.get(path), Some(Entry::Dir { .. }))
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.read_state().entries.get(path), Some(Entry::File { .. }))
    }

    fn last_modified(&self, path: &Path) -> Option<SystemTime> {
        self.read_state().entries.get(path).map(Entry::modified)
    }

    fn file_size(&self, path: &Path) -> u64 {
        match self.read_state().entries.get(path) {
            Some(Entry::File { data, .. }) => data.len() as u64,
            _ => 0,
        }
    }

    fn list_children(&self, path: &Path, filter: &dyn EntryFilter) -> Result<Vec<PathBuf>> {
        let state = self.read_state();
        match state.entries.get(path) {
            Some(Entry::Dir { .. }) => state.check_allowed(path)?,
            Some(Entry::File { .. }) => return Err(OpError::failed(path, "Not a directory")),
            None => {
                return Err(OpError::NotFound {
                    path: path.to_path_buf(),
                });
            }
        }
        Ok(state
            .subtree(path)
            .into_iter()
            .filter(|p| p.parent() == Some(path))
            .filter(|p| filter.accept(p))
            .collect())
    }

    fn create_dir(&self, path: &Path) -> Result<()> {
        let modified = self.tick();
        let mut state = self.write();
        state.check_allowed(path)?;
        state.require_parent_dir(path)?;
        state.require_absent(path)?;
        state
            .entries
            .insert(path.to_path_buf(), Entry::Dir { modified });
        drop(state);
        self.mutated();
        Ok(())
    }

    fn create_file(&self, path: &Path) -> Result<()> {
        let modified = self.tick();
        let mut state = self.write();
        state.check_allowed(path)?;
        state.require_parent_dir(path)?;
        state.require_absent(path)?;
        state.entries.insert(
            path.to_path_buf(),
            Entry::File {
                data: Vec::new(),
                modified,
            },
        );
        drop(state);
        self.mutated();
        Ok(())
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<u64> {
        let modified = self.tick();
        let mut state = self.write();
        state.check_allowed(from)?;
        state.check_allowed(to)?;
        let data = match state.entries.get(from) {
            Some(Entry::File { data, .. }) => data.clone(),
            Some(Entry::Dir { .. }) => return Err(OpError::failed(from, "Is a directory")),
            None => {
                return Err(OpError::NotFound {
                    path: from.to_path_buf(),
                });
            }
        };
        state.require_parent_dir(to)?;
        if matches!(state.entries.get(to), Some(Entry::Dir { .. })) {
            return Err(OpError::AlreadyExists {
                path: to.to_path_buf(),
            });
        }
        let len = data.len() as u64;
        state
            .entries
            .insert(to.to_path_buf(), Entry::File { data, modified });
        drop(state);
        self.mutated();
        Ok(len)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut state = self.write();
        state.check_allowed(from)?;
        state.check_allowed(to)?;
        if !state.entries.contains_key(from) {
            return Err(OpError::NotFound {
                path: from.to_path_buf(),
            });
        }
        if to.starts_with(from) {
            return Err(OpError::invalid_target(to, "Cannot move a directory into itself"));
        }
        state.require_parent_dir(to)?;
        state.require_absent(to)?;
        for old in state.subtree(from) {
            if let Some(entry) = state.entries.remove(&old) {
                let suffix = old.strip_prefix(from).unwrap_or(Path::new(""));
                let new = if suffix.as_os_str().is_empty() {
                    to.to_path_buf()
                } else {
                    to.join(suffix)
                };
                state.entries.insert(new, entry);
            }
        }
        drop(state);
        self.mutated();
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<()> {
        let mut state = self.write();
        if !state.entries.contains_key(path) {
            return Err(OpError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let doomed = state.subtree(path);
        for p in &doomed {
            state.check_allowed(p)?;
        }
        for p in doomed {
            state.entries.remove(&p);
        }
        drop(state);
        self.mutated();
        Ok(())
    }

    fn same_volume(&self, path: &Path, target_dir: &Path) -> bool {
        let state = self.read_state();
        Self::volume_of(&state, path) == Self::volume_of(&state, target_dir)
    }
}
