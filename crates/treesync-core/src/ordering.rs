//! Sibling ordering policies.

use std::cmp::Ordering;

use crate::node::SortKey;

/// A total, deterministic order over sibling nodes.
///
/// Implementations must never return `Equal` for two keys with different
/// paths, otherwise binary search over a child list cannot tell siblings
/// apart.
pub trait OrderingPolicy: Send + Sync + std::fmt::Debug {
    /// Compare two sibling keys.
    fn compare(&self, a: &SortKey<'_>, b: &SortKey<'_>) -> Ordering;
}

/// Directories first, then case-insensitive name, then path.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirsFirst;

impl OrderingPolicy for DirsFirst {
    fn compare(&self, a: &SortKey<'_>, b: &SortKey<'_>) -> Ordering {
        b.is_dir
            .cmp(&a.is_dir)
            .then_with(|| compare_names(a, b))
    }
}

/// Case-insensitive name, then path; directories are not grouped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameOnly;

impl OrderingPolicy for NameOnly {
    fn compare(&self, a: &SortKey<'_>, b: &SortKey<'_>) -> Ordering {
        compare_names(a, b)
    }
}

fn compare_names(a: &SortKey<'_>, b: &SortKey<'_>) -> Ordering {
    caseless_cmp(a.name, b.name).then_with(|| a.path.cmp(b.path))
}

/// Compare two names ignoring case.
pub fn caseless_cmp(a: &str, b: &str) -> Ordering {
    if a.is_ascii() && b.is_ascii() {
        return a
            .bytes()
            .map(|c| c.to_ascii_lowercase())
            .cmp(b.bytes().map(|c| c.to_ascii_lowercase()));
    }
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn key<'a>(is_dir: bool, name: &'a str, path: &'a str) -> SortKey<'a> {
        SortKey {
            is_dir,
            name,
            path: Path::new(path),
        }
    }

    #[test]
    fn test_dirs_before_files() {
        let dir = key(true, "zeta", "/r/zeta");
        let file = key(false, "alpha", "/r/alpha");
        assert_eq!(DirsFirst.compare(&dir, &file), Ordering::Less);
        assert_eq!(DirsFirst.compare(&file, &dir), Ordering::Greater);
    }

    #[test]
    fn test_case_insensitive_names() {
        let a = key(false, "apple", "/r/apple");
        let b = key(false, "Banana", "/r/Banana");
        assert_eq!(DirsFirst.compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn test_case_only_difference_is_strict() {
        let upper = key(false, "A", "/r/A");
        let lower = key(false, "a", "/r/a");
        assert_eq!(DirsFirst.compare(&upper, &lower), Ordering::Less);
        assert_eq!(DirsFirst.compare(&lower, &upper), Ordering::Greater);
        assert_eq!(DirsFirst.compare(&lower, &lower), Ordering::Equal);
    }

    #[test]
    fn test_name_only_ignores_kind() {
        let dir = key(true, "zeta", "/r/zeta");
        let file = key(false, "alpha", "/r/alpha");
        assert_eq!(NameOnly.compare(&dir, &file), Ordering::Greater);
    }

    #[test]
    fn test_caseless_cmp_unicode() {
        assert_eq!(caseless_cmp("Ärger", "ärger"), Ordering::Equal);
        assert_eq!(caseless_cmp("abc", "ABD"), Ordering::Less);
    }
}
