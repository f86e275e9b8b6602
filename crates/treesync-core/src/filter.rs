//! Listing filters.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::SyncConfig;
use crate::error::ConfigError;
use crate::sidecar::SidecarPolicy;

/// Decides whether a listed path becomes a visible tree entry.
///
/// The same filter is used by refresh and by the batch engine when it counts
/// files for progress reporting.
pub trait EntryFilter: Send + Sync {
    /// Return true to keep the entry.
    fn accept(&self, path: &Path) -> bool;
}

impl<F> EntryFilter for F
where
    F: Fn(&Path) -> bool + Send + Sync,
{
    fn accept(&self, path: &Path) -> bool {
        self(path)
    }
}

/// Keeps everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl EntryFilter for AcceptAll {
    fn accept(&self, _path: &Path) -> bool {
        true
    }
}

/// Hides hidden entries, well-known system entries, sidecar files and
/// anything matching an ignore pattern.
#[derive(Debug, Clone)]
pub struct DefaultFilter {
    include_hidden: bool,
    system_names: Vec<String>,
    sidecars: SidecarPolicy,
    ignore: GlobSet,
}

impl DefaultFilter {
    /// Build the filter described by a configuration.
    pub fn from_config(config: &SyncConfig) -> Result<Self, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.ignore_patterns {
            let glob = Glob::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            builder.add(glob);
        }
        let ignore = builder.build().map_err(|e| ConfigError::InvalidPattern {
            pattern: config.ignore_patterns.join(", "),
            message: e.to_string(),
        })?;

        Ok(Self {
            include_hidden: config.include_hidden,
            system_names: config.system_names.clone(),
            sidecars: config.sidecars(),
            ignore,
        })
    }
}

impl EntryFilter for DefaultFilter {
    fn accept(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return true;
        };
        if !self.include_hidden && name.starts_with('.') {
            return false;
        }
        if self.system_names.iter().any(|s| s.eq_ignore_ascii_case(name)) {
            return false;
        }
        if self.sidecars.is_sidecar(path) {
            return false;
        }
        !self.ignore.is_match(name)
    }
}
