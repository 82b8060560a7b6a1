//! File record representation.
//!
//! A FileRecord is the unit stored in the index: one file or directory,
//! keyed by its absolute path. The lowercase name is derived from the
//! name and is never set independently, so the two can't drift apart.

use serde::{Deserialize, Serialize};
use std::path::{is_separator, Path};

/// One indexed file or directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    path: String,
    name: String,
    name_lower: String,
    is_directory: bool,
}

impl FileRecord {
    /// Creates a record, deriving the lowercase name.
    pub fn new(path: impl Into<String>, name: impl Into<String>, is_directory: bool) -> Self {
        let name = name.into();
        let name_lower = name.to_lowercase();
        Self {
            path: path.into(),
            name,
            name_lower,
            is_directory,
        }
    }

    /// Builds a record from a filesystem path.
    ///
    /// Returns None for paths without a final segment (like `/`).
    pub fn from_path(path: &Path, is_directory: bool) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().into_owned();
        Some(Self::new(path.to_string_lossy(), name, is_directory))
    }

    /// Absolute, platform-native path. Unique across the index.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment as found on disk.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Always `name().to_lowercase()`.
    pub fn name_lower(&self) -> &str {
        &self.name_lower
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    /// True when this record's path lies in the subtree rooted at `prefix`.
    pub fn is_within(&self, prefix: &str) -> bool {
        is_within(&self.path, prefix)
    }
}

/// Subtree membership over paths, respecting segment boundaries.
///
/// `/a/b` is within `/a`, and `/a` is within itself, but `/a2` is not
/// within `/a` even though it shares the string prefix.
pub fn is_within(path: &str, prefix: &str) -> bool {
    if !path.starts_with(prefix) {
        return false;
    }
    if path.len() == prefix.len() {
        return true;
    }
    // A prefix that already ends in a separator (like `/`) covers everything below it.
    if prefix.chars().next_back().is_some_and(is_separator) {
        return true;
    }
    path[prefix.len()..].chars().next().is_some_and(is_separator)
}
