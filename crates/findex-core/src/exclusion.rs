//! Exclusion rules shared by the crawler, the change listener and the
//! live fallback walk.
//!
//! Matching is exact: a segment is skipped when it is hidden, when it
//! equals one of the skip names, or when it is a file whose lowercase
//! extension is a noise extension. There are no globs.

use std::collections::HashSet;
use std::path::{Component, Path};

/// System and noise directory names that are never indexed.
pub const BUILTIN_SKIP_NAMES: &[&str] = &[
    "node_modules",
    "$Recycle.Bin",
    "System Volume Information",
    "Windows",
    "ProgramData",
    "AppData",
    "Recovery",
    ".git",
    ".svn",
    ".hg",
    "cache",
    "Cache",
    ".cache",
    "tmp",
    "temp",
    "Temp",
    ".tmp",
    "__pycache__",
    // Legacy junction points under Windows profiles; they can't be read or watched.
    "Application Data",
    "Local Settings",
    "Cookies",
    "NetHood",
    "PrintHood",
    "Recent",
    "SendTo",
    "Start Menu",
    "Templates",
    "My Documents",
    "My Pictures",
    "My Music",
    "My Videos",
];

/// File extensions (lowercase, without the dot) that are never indexed.
pub const BUILTIN_SKIP_EXTENSIONS: &[&str] = &[
    "dll", "exe", "sys", "msi", "cab", "log", "tmp", "temp", "bak", "swp",
];

const HIDDEN_MARKER: char = '.';

/// Decides whether a path segment should be skipped.
#[derive(Debug, Clone)]
pub struct ExclusionPolicy {
    skip_names: HashSet<String>,
    skip_extensions: HashSet<String>,
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>())
    }
}

impl ExclusionPolicy {
    /// Creates a policy from the built-in sets plus user-supplied names.
    pub fn new<I, S>(extra_patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut skip_names: HashSet<String> =
            BUILTIN_SKIP_NAMES.iter().map(|s| s.to_string()).collect();
        skip_names.extend(
            extra_patterns
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty()),
        );

        Self {
            skip_names,
            skip_extensions: BUILTIN_SKIP_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Checks a single name.
    pub fn excludes_name(&self, name: &str, is_directory: bool) -> bool {
        if name.starts_with(HIDDEN_MARKER) || self.skip_names.contains(name) {
            return true;
        }
        if is_directory {
            return false;
        }
        extension_of(name)
            .map(|ext| self.skip_extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }

    /// Checks every segment of a path relative to a watched root.
    ///
    /// Intermediate segments are directories; only the last one can be
    /// a file and so only the last one is subject to the extension rule.
    pub fn excludes_relative(&self, relative: &Path, is_directory: bool) -> bool {
        let names: Vec<_> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy()),
                _ => None,
            })
            .collect();

        let last = names.len().saturating_sub(1);
        names
            .iter()
            .enumerate()
            .any(|(i, name)| self.excludes_name(name, i < last || is_directory))
    }
}

/// Same rule as `Path::extension`: text after the last dot, unless the
/// dot is the first character.
fn extension_of(name: &str) -> Option<&str> {
    let idx = name.rfind('.')?;
    if idx == 0 || idx + 1 == name.len() {
        return None;
    }
    Some(&name[idx + 1..])
}
