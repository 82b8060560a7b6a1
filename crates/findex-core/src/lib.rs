//! Findex Core - records, exclusion rules and scoring
//!
//! This crate holds the pure pieces of Findex: the record type stored
//! in the index, the exclusion policy every walker shares, the match
//! scorer, and the typed settings. Nothing here touches the index store.
//!
//! # Example
//!
//! ```
//! use findex_core::{parse_query, score};
//!
//! let terms = parse_query("docker");
//! assert_eq!(score("Dockerfile", &terms), 600);
//! ```

pub mod config;
pub mod error;
pub mod exclusion;
pub mod query;
pub mod record;
pub mod scorer;

pub use config::Settings;
pub use error::{ConfigError, Result};
pub use exclusion::ExclusionPolicy;
pub use query::{contains_all_terms, parse_query, rank, ScoredCandidate, SearchHit};
pub use record::{is_within, FileRecord};
pub use scorer::{is_subsequence, score, MatchTier};
