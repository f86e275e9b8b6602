//! Core types and traits for treesync.
//!
//! This crate provides the fundamental pieces shared by the sync and batch
//! engines: the in-memory tree arena, sibling ordering, listing filters,
//! sidecar naming, configuration, errors, and the file system adapter.

mod config;
mod error;
mod filter;
pub mod fs;
mod naming;
mod node;
mod ordering;
mod sidecar;
mod tree;

pub use config::{MountConfig, SyncConfig, SyncConfigBuilder, SyncConfigBuilderError};
pub use error::{ConfigError, ErrorKind, OpError, OpWarning, Result, WarningKind};
pub use filter::{AcceptAll, DefaultFilter, EntryFilter};
pub use fs::{FileSystem, LocalFs, MemoryFs};
pub use naming::{MAX_NAME_LEN, NameError, unique_path, validate_filename};
pub use node::{EntryInfo, NodeId, NodeKind, SortKey, TreeNode};
pub use ordering::{DirsFirst, NameOnly, OrderingPolicy, caseless_cmp};
pub use sidecar::SidecarPolicy;
pub use tree::{FileTree, TreeEvent};
