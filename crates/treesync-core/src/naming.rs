//! File name validation and conflict-free naming.

use std::path::{Path, PathBuf, is_separator};

use thiserror::Error;

use crate::fs::FileSystem;

/// Longest name accepted, in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Why a proposed entry name was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("Name cannot be empty")]
    Empty,
    #[error("Name is {0} bytes long (max {max})", max = MAX_NAME_LEN)]
    TooLong(usize),
    #[error("Name cannot contain '{}'", .0.escape_default())]
    Forbidden(char),
    #[error("'.' and '..' cannot be used as names")]
    DotName,
    #[error("Name cannot start or end with a space")]
    Padded,
    #[error("Name cannot end with a dot")]
    TrailingDot,
}

/// Check that `name` is a single entry name every supported platform can
/// store.
pub fn validate_filename(name: &str) -> Result<(), NameError> {
    match name {
        "" => return Err(NameError::Empty),
        "." | ".." => return Err(NameError::DotName),
        _ => {}
    }
    if name.len() > MAX_NAME_LEN {
        return Err(NameError::TooLong(name.len()));
    }
    if let Some(c) = name.chars().find(|&c| c == '\0' || c == '/' || is_separator(c)) {
        return Err(NameError::Forbidden(c));
    }
    if name.starts_with(' ') || name.ends_with(' ') {
        return Err(NameError::Padded);
    }
    if name.ends_with('.') {
        return Err(NameError::TrailingDot);
    }
    Ok(())
}

/// First free variant of `path` in its directory.
///
/// For "file.txt", tries "file (1).txt", "file (2).txt", etc.
pub fn unique_path(fs: &dyn FileSystem, path: &Path) -> PathBuf {
    if !fs.exists(path) {
        return path.to_path_buf();
    }

    let parent = path.parent().unwrap_or(Path::new(""));
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    let extension = path.extension().and_then(|e| e.to_str());

    (1u32..)
        .map(|i| match extension {
            Some(ext) => parent.join(format!("{stem} ({i}).{ext}")),
            None => parent.join(format!("{stem} ({i})")),
        })
        .find(|candidate| !fs.exists(candidate))
        .unwrap_or_else(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;

    #[test]
    fn test_accepts_ordinary_names() {
        for name in ["report.aadl", "report.aadl.prefs", ".project", "two words", "a..b"] {
            assert_eq!(validate_filename(name), Ok(()), "{name}");
        }
    }

    #[test]
    fn test_rejects_unstorable_names() {
        assert_eq!(validate_filename(""), Err(NameError::Empty));
        assert_eq!(validate_filename(".."), Err(NameError::DotName));
        assert_eq!(validate_filename("dir/file"), Err(NameError::Forbidden('/')));
        assert_eq!(validate_filename("nul\0byte"), Err(NameError::Forbidden('\0')));
        assert_eq!(validate_filename(" lead"), Err(NameError::Padded));
        assert_eq!(validate_filename("model."), Err(NameError::TrailingDot));
        assert_eq!(
            validate_filename(&"x".repeat(MAX_NAME_LEN + 1)),
            Err(NameError::TooLong(MAX_NAME_LEN + 1))
        );
        assert!(validate_filename("x".repeat(MAX_NAME_LEN).as_str()).is_ok());
    }

    #[test]
    fn test_name_error_message() {
        assert_eq!(
            NameError::Forbidden('\0').to_string(),
            "Name cannot contain '\\u{0}'"
        );
    }

    #[test]
    fn test_unique_path() {
        let fs = MemoryFs::new();
        fs.add_file("/d/test.txt", "").add_file("/d/test (1).txt", "");
        assert_eq!(
            unique_path(&fs, Path::new("/d/test.txt")),
            PathBuf::from("/d/test (2).txt")
        );
        assert_eq!(
            unique_path(&fs, Path::new("/d/other")),
            PathBuf::from("/d/other")
        );
    }

    #[test]
    fn test_unique_path_no_extension() {
        let fs = MemoryFs::new();
        fs.add_dir("/d/folder");
        assert_eq!(
            unique_path(&fs, Path::new("/d/folder")),
            PathBuf::from("/d/folder (1)")
        );
    }
}
