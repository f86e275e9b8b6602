//! Conflict detection and resolution for batch operations.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A name conflict in the target directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    /// The source path being operated on.
    pub source: PathBuf,
    /// The destination path where the conflict exists.
    pub destination: PathBuf,
    /// The kind of conflict.
    pub kind: ConflictKind,
}

impl Conflict {
    /// Create a new conflict.
    pub fn new(source: PathBuf, destination: PathBuf, kind: ConflictKind) -> Self {
        Self {
            source,
            destination,
            kind,
        }
    }
}

/// The kind of conflict encountered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
    /// A file already exists at the destination.
    FileExists,
    /// A directory already exists at the destination.
    DirectoryExists,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileExists => write!(f, "File already exists"),
            Self::DirectoryExists => write!(f, "Directory already exists"),
        }
    }
}

/// How to resolve a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConflictResolution {
    /// Skip this item.
    #[default]
    Skip,
    /// Replace the existing item.
    Overwrite,
    /// Place the new item next to the existing one as "name (1).ext".
    AutoRename,
    /// Skip all remaining conflicts.
    SkipAll,
    /// Overwrite all remaining conflicts.
    OverwriteAll,
    /// Abort the entire operation.
    Abort,
}

impl ConflictResolution {
    /// Check if this resolution applies to all remaining conflicts.
    pub fn is_global(&self) -> bool {
        matches!(self, Self::SkipAll | Self::OverwriteAll | Self::Abort)
    }

    /// Convert a global resolution to its single-item equivalent.
    pub fn to_single(&self) -> Self {
        match self {
            Self::SkipAll => Self::Skip,
            Self::OverwriteAll => Self::Overwrite,
            _ => *self,
        }
    }
}

/// Answers conflicts one at a time, typically by asking the user.
pub trait ConflictResolver: Send + Sync {
    /// Decide what to do about `conflict`.
    fn resolve(&self, conflict: &Conflict) -> ConflictResolution;
}

impl<F> ConflictResolver for F
where
    F: Fn(&Conflict) -> ConflictResolution + Send + Sync,
{
    fn resolve(&self, conflict: &Conflict) -> ConflictResolution {
        self(conflict)
    }
}

/// What a batch does when an item's name is already taken in the target.
#[derive(Clone, Default)]
pub enum OverwritePolicy {
    /// Replace every conflicting entry.
    Overwrite,
    /// Leave every conflicting entry alone and skip the item.
    #[default]
    Skip,
    /// Ask the resolver. A global answer covers all remaining conflicts.
    Ask(Arc<dyn ConflictResolver>),
}

impl OverwritePolicy {
    /// Policy that asks `resolver` for each conflict.
    pub fn ask(resolver: impl ConflictResolver + 'static) -> Self {
        Self::Ask(Arc::new(resolver))
    }
}

impl fmt::Debug for OverwritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overwrite => write!(f, "Overwrite"),
            Self::Skip => write!(f, "Skip"),
            Self::Ask(_) => write!(f, "Ask(..)"),
        }
    }
}

/// Per-batch conflict state. Remembers a global answer once given.
#[derive(Debug)]
pub(crate) struct ConflictState<'a> {
    policy: &'a OverwritePolicy,
    sticky: Option<ConflictResolution>,
}

impl<'a> ConflictState<'a> {
    pub(crate) fn new(policy: &'a OverwritePolicy) -> Self {
        Self {
            policy,
            sticky: None,
        }
    }

    /// Single-item decision for `conflict`.
    pub(crate) fn resolve(&mut self, conflict: &Conflict) -> ConflictResolution {
        if let Some(sticky) = self.sticky {
            return sticky.to_single();
        }
        match self.policy {
            OverwritePolicy::Overwrite => ConflictResolution::Overwrite,
            OverwritePolicy::Skip => ConflictResolution::Skip,
            OverwritePolicy::Ask(resolver) => {
                let answer = resolver.resolve(conflict);
                if answer.is_global() {
                    self.sticky = Some(answer);
                }
                answer.to_single()
            }
        }
    }
}
