//! Direct filesystem search, used while no index is ready.

use crate::walk::{log_walk_error, walk};
use findex_core::{rank, ExclusionPolicy, FileRecord, ScoredCandidate};
use std::path::PathBuf;
use tracing::debug;

/// Walks the roots to `max_depth`, scoring every entry against `terms`.
///
/// The walk stops once `cap` matches were collected. Results come back
/// ranked best-first.
pub fn search_live(
    roots: &[PathBuf],
    policy: &ExclusionPolicy,
    max_depth: usize,
    terms: &[String],
    cap: usize,
) -> Vec<ScoredCandidate> {
    let mut found = Vec::new();
    if terms.is_empty() || cap == 0 {
        return found;
    }

    'roots: for root in roots {
        for entry in walk(root, max_depth, policy) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log_walk_error(&err);
                    continue;
                }
            };

            let Some(record) = FileRecord::from_path(entry.path(), entry.file_type().is_dir())
            else {
                continue;
            };
            if let Some(candidate) = ScoredCandidate::score(record, terms) {
                found.push(candidate);
                if found.len() >= cap {
                    break 'roots;
                }
            }
        }
    }

    debug!("Live search found {} matches", found.len());
    rank(&mut found);
    found
}
