//! Sync configuration types.

use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::filter::DefaultFilter;
use crate::ordering::{DirsFirst, NameOnly, OrderingPolicy};
use crate::sidecar::SidecarPolicy;

/// A named on-disk directory anchored at the top of the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfig {
    /// Label shown for the mount root.
    pub name: String,
    /// Directory the mount mirrors.
    pub path: PathBuf,
}

impl MountConfig {
    /// Create a mount.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

impl FromStr for MountConfig {
    type Err = ConfigError;

    /// Parse `NAME=PATH`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((name, path)) if !name.trim().is_empty() && !path.is_empty() => {
                Ok(Self::new(name.trim(), path))
            }
            _ => Err(ConfigError::Invalid {
                message: format!("expected NAME=PATH, got '{s}'"),
            }),
        }
    }
}

/// Configuration for tree synchronization and batch operations.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct SyncConfig {
    /// Mount roots, in display order.
    #[serde(default)]
    pub mounts: Vec<MountConfig>,

    /// Show entries whose name starts with a dot.
    #[builder(default = "false")]
    #[serde(default)]
    pub include_hidden: bool,

    /// Glob patterns matched against entry names; matches are hidden.
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Entry names always hidden (compared case-insensitively).
    #[builder(default = "default_system_names()")]
    #[serde(default = "default_system_names")]
    pub system_names: Vec<String>,

    /// Suffixes that mark sidecar files.
    #[builder(default = "default_sidecar_suffixes()")]
    #[serde(default = "default_sidecar_suffixes")]
    pub sidecar_suffixes: Vec<String>,

    /// Group directories before files.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub dirs_first: bool,

    /// Send deleted items to the OS trash instead of removing them.
    #[builder(default = "false")]
    #[serde(default)]
    pub use_trash: bool,
}

fn default_true() -> bool {
    true
}

fn default_system_names() -> Vec<String> {
    [
        ".DS_Store",
        "Thumbs.db",
        "desktop.ini",
        "$RECYCLE.BIN",
        "System Volume Information",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_sidecar_suffixes() -> Vec<String> {
    vec![".prefs".to_string()]
}

impl SyncConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        let Some(ref mounts) = self.mounts else {
            return Err("At least one mount is required".to_string());
        };
        check_mounts(mounts).map_err(|e| e.to_string())?;
        if let Some(ref suffixes) = self.sidecar_suffixes {
            check_suffixes(suffixes).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

impl SyncConfig {
    /// Create a new config builder.
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Create a config with default policies for the given mounts.
    pub fn new(mounts: Vec<MountConfig>) -> Self {
        Self {
            mounts,
            include_hidden: false,
            ignore_patterns: Vec::new(),
            system_names: default_system_names(),
            sidecar_suffixes: default_sidecar_suffixes(),
            dirs_first: true,
            use_trash: false,
        }
    }

    /// Validate a config that did not come through the builder.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_mounts(&self.mounts)?;
        check_suffixes(&self.sidecar_suffixes)
    }

    /// The sibling ordering this config selects.
    pub fn ordering(&self) -> Arc<dyn OrderingPolicy> {
        if self.dirs_first {
            Arc::new(DirsFirst)
        } else {
            Arc::new(NameOnly)
        }
    }

    /// The sidecar policy this config selects.
    pub fn sidecars(&self) -> SidecarPolicy {
        SidecarPolicy::new(self.sidecar_suffixes.iter().cloned())
    }

    /// The listing filter this config selects.
    pub fn filter(&self) -> Result<DefaultFilter, ConfigError> {
        DefaultFilter::from_config(self)
    }

    /// Paths of every mount root.
    pub fn mount_paths(&self) -> Vec<PathBuf> {
        self.mounts.iter().map(|m| m.path.clone()).collect()
    }
}

fn check_mounts(mounts: &[MountConfig]) -> Result<(), ConfigError> {
    if mounts.is_empty() {
        return Err(ConfigError::Invalid {
            message: "At least one mount is required".to_string(),
        });
    }
    let mut seen = HashSet::new();
    for mount in mounts {
        if mount.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "Mount name cannot be empty".to_string(),
            });
        }
        if mount.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                message: format!("Mount '{}' has an empty path", mount.name),
            });
        }
        if !seen.insert(mount.name.as_str()) {
            return Err(ConfigError::Invalid {
                message: format!("Duplicate mount name '{}'", mount.name),
            });
        }
    }
    Ok(())
}

fn check_suffixes(suffixes: &[String]) -> Result<(), ConfigError> {
    if suffixes.iter().any(|s| s.is_empty()) {
        return Err(ConfigError::Invalid {
            message: "Sidecar suffixes cannot be empty".to_string(),
        });
    }
    Ok(())
}
