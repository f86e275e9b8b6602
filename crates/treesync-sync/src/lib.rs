//! On-demand tree synchronization for treesync.
//!
//! `treesync-sync` keeps a [`FileTree`](treesync_core::FileTree) in step with
//! the file system without ever walking it eagerly. Nodes are loaded when a
//! caller asks for them:
//!
//! - **Refresh** diffs one node's children against a fresh listing
//! - **Resolve** loads every directory on the way to a path
//! - **Create and rename** mutate the file system and the tree together,
//!   carrying sidecar files along with their primary
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use treesync_core::{FileTree, LocalFs, MountConfig, SyncConfig};
//! use treesync_sync::SyncEngine;
//!
//! let config = SyncConfig::new(vec![MountConfig::new("home", "/home/me")]);
//! let engine = SyncEngine::from_config(Arc::new(LocalFs::new()), &config).unwrap();
//! let mut tree = FileTree::from_config(&config);
//!
//! if let Some(chain) = engine.resolve_path(&mut tree, Path::new("/home/me/notes.txt")).unwrap() {
//!     let node = *chain.last().unwrap();
//!     engine.rename(&mut tree, node, "notes-old.txt").unwrap();
//! }
//! ```
//!
//! # Change notifications
//!
//! Every change made through the engine is also broadcast:
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use treesync_core::{AcceptAll, MemoryFs, SidecarPolicy};
//! # use treesync_sync::SyncEngine;
//! let engine = SyncEngine::new(Arc::new(MemoryFs::new()), Arc::new(AcceptAll), SidecarPolicy::default());
//! let mut events = engine.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//! });
//! ```

mod engine;
mod mutate;
mod resolve;

pub use engine::SyncEngine;
pub use mutate::RenameOutcome;
