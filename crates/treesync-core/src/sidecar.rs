//! Sidecar file naming.
//!
//! A sidecar is a secondary file that shares its primary's full name plus a
//! recognized suffix, e.g. `report.aadl.prefs` next to `report.aadl`. It is
//! expected to follow the primary on rename, move, copy and delete.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::fs::FileSystem;

/// Recognized sidecar suffixes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidecarPolicy {
    suffixes: Vec<String>,
}

impl SidecarPolicy {
    /// Create a policy from a list of suffixes (each including its dot).
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            suffixes: suffixes
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        }
    }

    /// A policy that recognizes no sidecars.
    pub fn none() -> Self {
        Self {
            suffixes: Vec::new(),
        }
    }

    /// The recognized suffixes.
    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    /// Whether the path names a sidecar file (by suffix, not by existence).
    pub fn is_sidecar(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.suffixes
            .iter()
            .any(|suffix| name.len() > suffix.len() && name.ends_with(suffix.as_str()))
    }

    /// Every candidate sidecar path for a primary, existing or not.
    pub fn candidates(&self, primary: &Path) -> Vec<PathBuf> {
        self.suffixes
            .iter()
            .map(|suffix| with_suffix(primary, suffix))
            .collect()
    }

    /// Sidecars of a primary that currently exist as files.
    ///
    /// Directories and sidecars themselves never have sidecars.
    pub fn existing(&self, fs: &dyn FileSystem, primary: &Path) -> Vec<PathBuf> {
        if self.is_sidecar(primary) || !fs.is_file(primary) {
            return Vec::new();
        }
        self.candidates(primary)
            .into_iter()
            .filter(|candidate| fs.is_file(candidate))
            .collect()
    }

    /// Primary paths a sidecar may belong to, one per matching suffix.
    pub fn primaries_of(&self, sidecar: &Path) -> Vec<PathBuf> {
        let Some(name) = sidecar.file_name().and_then(|n| n.to_str()) else {
            return Vec::new();
        };
        self.suffixes
            .iter()
            .filter_map(|suffix| name.strip_suffix(suffix.as_str()))
            .filter(|primary| !primary.is_empty())
            .map(|primary| sidecar.with_file_name(primary))
            .collect()
    }

    /// Where a sidecar should go when its primary moves to `new_primary`.
    pub fn follow(&self, sidecar: &Path, old_primary: &Path, new_primary: &Path) -> PathBuf {
        let suffix = sidecar
            .file_name()
            .and_then(|n| n.to_str())
            .zip(old_primary.file_name().and_then(|n| n.to_str()))
            .and_then(|(side, primary)| side.strip_prefix(primary))
            .unwrap_or_default();
        with_suffix(new_primary, suffix)
    }
}

impl Default for SidecarPolicy {
    fn default() -> Self {
        Self::new([".prefs"])
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_sidecar() {
        let policy = SidecarPolicy::default();
        assert!(policy.is_sidecar(Path::new("/a/report.aadl.prefs")));
        assert!(!policy.is_sidecar(Path::new("/a/report.aadl")));
        assert!(!policy.is_sidecar(Path::new("/a/.prefs")));
    }

    #[test]
    fn test_candidates() {
        let policy = SidecarPolicy::new([".prefs", ".meta"]);
        let candidates = policy.candidates(Path::new("/a/x.txt"));
        assert_eq!(
            candidates,
            vec![PathBuf::from("/a/x.txt.prefs"), PathBuf::from("/a/x.txt.meta")]
        );
    }

    #[test]
    fn test_follow() {
        let policy = SidecarPolicy::default();
        let target = policy.follow(
            Path::new("/a/report.aadl.prefs"),
            Path::new("/a/report.aadl"),
            Path::new("/b/summary.aadl"),
        );
        assert_eq!(target, PathBuf::from("/b/summary.aadl.prefs"));
    }

    #[test]
    fn test_primaries_of() {
        let policy = SidecarPolicy::default();
        assert_eq!(
            policy.primaries_of(Path::new("/a/report.aadl.prefs")),
            vec![PathBuf::from("/a/report.aadl")]
        );
        assert!(policy.primaries_of(Path::new("/a/.prefs")).is_empty());
        assert!(policy.primaries_of(Path::new("/a/report.aadl")).is_empty());
    }

    #[test]
    fn test_none_policy() {
        let policy = SidecarPolicy::none();
        assert!(!policy.is_sidecar(Path::new("/a/report.aadl.prefs")));
        assert!(policy.candidates(Path::new("/a/x")).is_empty());
    }
}
