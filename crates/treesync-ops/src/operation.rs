//! Batch request types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::progress::OperationType;

/// A batch to be executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileOperation {
    /// Copy files/directories into a target directory.
    Copy {
        sources: Vec<PathBuf>,
        destination: PathBuf,
    },
    /// Move files/directories into a target directory.
    Move {
        sources: Vec<PathBuf>,
        destination: PathBuf,
    },
    /// Delete files/directories.
    Delete {
        targets: Vec<PathBuf>,
        use_trash: bool,
    },
}

impl FileOperation {
    /// Create a copy operation.
    pub fn copy(sources: Vec<PathBuf>, destination: PathBuf) -> Self {
        Self::Copy {
            sources,
            destination,
        }
    }

    /// Create a move operation.
    pub fn move_to(sources: Vec<PathBuf>, destination: PathBuf) -> Self {
        Self::Move {
            sources,
            destination,
        }
    }

    /// Create a delete operation.
    pub fn delete(targets: Vec<PathBuf>, use_trash: bool) -> Self {
        Self::Delete { targets, use_trash }
    }

    /// The kind of batch.
    pub fn operation_type(&self) -> OperationType {
        match self {
            Self::Copy { .. } => OperationType::Copy,
            Self::Move { .. } => OperationType::Move,
            Self::Delete { .. } => OperationType::Delete,
        }
    }

    /// The source items.
    pub fn sources(&self) -> &[PathBuf] {
        match self {
            Self::Copy { sources, .. } | Self::Move { sources, .. } => sources,
            Self::Delete { targets, .. } => targets,
        }
    }
}
