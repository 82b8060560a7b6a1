//! User settings.
//!
//! Settings are stored as camelCase JSON. Every field has a default, so
//! a partial file (or no file at all) is valid.

use crate::error::{ConfigError, Result};
use crate::exclusion::ExclusionPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Exclude patterns offered to new users on top of the built-in skip set.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    "__pycache__",
    ".cache",
    "AppData",
    "$Recycle.Bin",
    "Windows",
];

/// Typed configuration for indexing and search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Roots to index. Empty means the user's home directory.
    pub search_paths: Vec<PathBuf>,
    /// Extra literal names to skip, on top of the built-in set.
    pub exclude_patterns: Vec<String>,
    /// Result cap per query.
    pub max_results: usize,
    /// Only return directories.
    pub show_only_directories: bool,
    /// Deepest level the full crawl records (entries under a root are level 0).
    pub max_depth: usize,
    /// Depth bound for the live walk used while no index is ready.
    pub live_search_max_depth: usize,
    /// Records per store transaction during a crawl.
    pub batch_size: usize,
    /// Age after which the index is rebuilt in the background.
    pub staleness_secs: u64,
    /// Delay before a background rebuild starts.
    pub refresh_delay_ms: u64,
    /// Quiet period a changed path must reach before it is indexed.
    pub debounce_ms: u64,
    /// Serve queries from the in-memory mirror instead of the store.
    pub in_memory_mirror: bool,
    /// Keep the index patched from filesystem events.
    pub watch: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            exclude_patterns: DEFAULT_EXCLUDE_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_results: 100,
            show_only_directories: false,
            max_depth: 8,
            live_search_max_depth: 5,
            batch_size: 1000,
            staleness_secs: 60 * 60,
            refresh_delay_ms: 5000,
            debounce_ms: 300,
            in_memory_mirror: true,
            watch: true,
        }
    }
}

impl Settings {
    /// Loads settings from a JSON file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No settings at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::io(path, e)),
        };

        serde_json::from_str(&content).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes settings as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|e| ConfigError::io(path, e))
    }

    /// Default location: `<config dir>/findex/settings.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("findex").join("settings.json"))
    }

    /// The roots to crawl and watch, falling back to the home directory.
    ///
    /// Relative roots are resolved against the working directory, so every
    /// recorded path is absolute.
    pub fn resolved_roots(&self) -> Result<Vec<PathBuf>> {
        if !self.search_paths.is_empty() {
            return self
                .search_paths
                .iter()
                .map(|root| {
                    std::path::absolute(root).map_err(|source| ConfigError::InvalidRoot {
                        path: root.clone(),
                        source,
                    })
                })
                .collect();
        }
        dirs::home_dir()
            .map(|home| vec![home])
            .ok_or(ConfigError::NoHomeDirectory)
    }

    /// The exclusion policy these settings describe.
    pub fn exclusion_policy(&self) -> ExclusionPolicy {
        ExclusionPolicy::new(self.exclude_patterns.iter().cloned())
    }

    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.staleness_secs)
    }

    pub fn refresh_delay(&self) -> Duration {
        Duration::from_millis(self.refresh_delay_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// True when switching to `other` invalidates the current index.
    pub fn index_changed(&self, other: &Settings) -> bool {
        self.search_paths != other.search_paths
            || self.exclude_patterns != other.exclude_patterns
            || self.max_depth != other.max_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.max_results, 100);
        assert_eq!(settings.max_depth, 8);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"maxResults": 25, "showOnlyDirectories": true}"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.max_results, 25);
        assert!(settings.show_only_directories);
        assert_eq!(settings.live_search_max_depth, 5);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Settings::load(&path),
            Err(ConfigError::Malformed { .. })
        ));
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            search_paths: vec![PathBuf::from("/data")],
            ..Settings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_explicit_roots_win() {
        let settings = Settings {
            search_paths: vec![PathBuf::from("/data")],
            ..Settings::default()
        };
        assert_eq!(settings.resolved_roots().unwrap(), vec![PathBuf::from("/data")]);
    }

    #[test]
    fn test_relative_roots_become_absolute() {
        let settings = Settings {
            search_paths: vec![PathBuf::from("projects")],
            ..Settings::default()
        };
        let roots = settings.resolved_roots().unwrap();
        assert!(roots[0].is_absolute());
        assert!(roots[0].ends_with("projects"));
        assert_eq!(
            roots[0],
            std::env::current_dir().unwrap().join("projects")
        );
    }

    #[test]
    fn test_index_changed() {
        let base = Settings::default();
        let capped = Settings {
            max_results: 5,
            ..Settings::default()
        };
        assert!(!base.index_changed(&capped));

        let excluded = Settings {
            exclude_patterns: vec!["vendor".into()],
            ..Settings::default()
        };
        assert!(base.index_changed(&excluded));
    }
}
