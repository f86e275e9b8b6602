//! Error and warning types shared by the sync and batch engines.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::node::NodeId;

/// Result alias used throughout treesync.
pub type Result<T, E = OpError> = std::result::Result<T, E>;

/// Coarse classification of an [`OpError`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    PermissionDenied,
    InvalidTarget,
    OperationFailed,
    Cancelled,
}

/// Errors that can occur while synchronizing or mutating the tree.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpError {
    /// Path not found.
    #[error("Path not found: {}", .path.display())]
    NotFound { path: PathBuf },

    /// Something already occupies the target path.
    #[error("Already exists: {}", .path.display())]
    AlreadyExists { path: PathBuf },

    /// Permission denied for a path.
    #[error("Permission denied: {}", .path.display())]
    PermissionDenied { path: PathBuf },

    /// The requested target is not acceptable for the operation.
    #[error("Invalid target {}: {reason}", .path.display())]
    InvalidTarget { path: PathBuf, reason: String },

    /// An underlying file system call failed.
    #[error("Operation failed at {}: {message}", .path.display())]
    OperationFailed { path: PathBuf, message: String },

    /// The item was not attempted because the batch was cancelled.
    #[error("Cancelled before {}", .path.display())]
    Cancelled { path: PathBuf },

    /// A node id that is not (or no longer) part of the tree.
    #[error("Unknown tree node #{id}")]
    UnknownNode { id: u64 },
}

impl OpError {
    /// Create an error from an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: &std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists { path },
            _ => Self::OperationFailed {
                path,
                message: source.to_string(),
            },
        }
    }

    /// Create an invalid target error.
    pub fn invalid_target(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an operation failed error.
    pub fn failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::OperationFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an unknown node error.
    pub fn unknown_node(id: NodeId) -> Self {
        Self::UnknownNode { id: id.0 }
    }

    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::InvalidTarget { .. } | Self::UnknownNode { .. } => ErrorKind::InvalidTarget,
            Self::OperationFailed { .. } => ErrorKind::OperationFailed,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// The path the error refers to.
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound { path }
            | Self::AlreadyExists { path }
            | Self::PermissionDenied { path }
            | Self::InvalidTarget { path, .. }
            | Self::OperationFailed { path, .. }
            | Self::Cancelled { path } => path,
            Self::UnknownNode { .. } => Path::new(""),
        }
    }
}

/// Errors in a [`SyncConfig`](crate::SyncConfig).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An ignore pattern is not a valid glob.
    #[error("Invalid ignore pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Structural problem with the configuration.
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Kind of non-fatal warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum WarningKind {
    /// A sidecar file could not follow its primary on rename or move.
    SidecarRename,
    /// A sidecar file could not be copied alongside its primary.
    SidecarCopy,
    /// A sidecar file could not be deleted with its primary.
    SidecarDelete,
}

/// Non-fatal warning attached to an otherwise successful operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl OpWarning {
    /// Create a new warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Downgrade a sidecar failure to a warning.
    pub fn sidecar(kind: WarningKind, error: &OpError) -> Self {
        Self {
            path: error.path().to_path_buf(),
            message: error.to_string(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_error_io() {
        let err = OpError::io(
            "/test/path",
            &std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, OpError::PermissionDenied { .. }));
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_op_error_io_other() {
        let err = OpError::io("/x", &std::io::Error::other("disk on fire"));
        assert_eq!(err.kind(), ErrorKind::OperationFailed);
        assert!(err.to_string().contains("disk on fire"));
        assert_eq!(err.path(), Path::new("/x"));
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::InvalidTarget.to_string(), "InvalidTarget");
        assert_eq!("Cancelled".parse::<ErrorKind>().unwrap(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_sidecar_warning() {
        let err = OpError::failed("/a/b.prefs", "busy");
        let warning = OpWarning::sidecar(WarningKind::SidecarRename, &err);
        assert_eq!(warning.path, PathBuf::from("/a/b.prefs"));
        assert!(warning.message.contains("busy"));
    }
}
