//! Depth-bounded directory walking shared by the crawler, the listener
//! and the live fallback search.
//!
//! Depth is counted from the root's children: entries directly under a
//! root are depth 0. An entry at depth `d` is yielded iff `d <= max_depth`,
//! so a directory at exactly `max_depth` is yielded but never opened.

use findex_core::ExclusionPolicy;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Walks `root` applying the exclusion policy to every entry below it.
///
/// The root itself is never yielded or filtered. Excluded directories are
/// pruned, so nothing beneath them is visited.
pub fn walk<'a>(
    root: &Path,
    max_depth: usize,
    policy: &'a ExclusionPolicy,
) -> impl Iterator<Item = walkdir::Result<DirEntry>> + 'a {
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth.saturating_add(1))
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| !is_excluded(policy, entry))
}

fn is_excluded(policy: &ExclusionPolicy, entry: &DirEntry) -> bool {
    policy.excludes_name(&entry.file_name().to_string_lossy(), entry.file_type().is_dir())
}

/// Logs a per-entry walk failure. The entry's subtree is simply skipped.
///
/// Returns true for expected access failures (permission denied and the
/// like), which are logged at debug level only.
pub fn log_walk_error(err: &walkdir::Error) -> bool {
    let path = err
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    match err.io_error().map(|e| e.kind()) {
        Some(ErrorKind::PermissionDenied) | Some(ErrorKind::NotFound) => {
            debug!("Skipping {}: {}", path, err);
            true
        }
        _ => {
            warn!("Walk error in {}: {}", path, err);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_depth_bound() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b/c/d")).unwrap();

        let policy = ExclusionPolicy::default();
        let names: Vec<_> = walk(dir.path(), 2, &policy)
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();

        // a is depth 0, b depth 1, c depth 2 (kept), d depth 3 (not visited).
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_excluded_directories_are_pruned() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::create_dir_all(dir.path().join(".hidden/inner")).unwrap();
        fs::write(dir.path().join("keep.txt"), "x").unwrap();
        fs::write(dir.path().join("trace.log"), "x").unwrap();

        let policy = ExclusionPolicy::default();
        let names: Vec<_> = walk(dir.path(), 8, &policy)
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["keep.txt"]);
    }
}
