//! Match scoring for candidate names.
//!
//! Every query term is graded into exactly one tier, highest first:
//!
//! | Tier        | Condition                                    | Points            |
//! |-------------|----------------------------------------------|-------------------|
//! | exact       | name equals the term                         | 1000              |
//! | prefix      | name starts with the term                    | 500 + 10 * len    |
//! | boundary    | term follows a space, `_`, `-` or `.`        | 300 + 5 * len     |
//! | substring   | term appears anywhere                        | 100 + 2 * len     |
//! | subsequence | term's characters appear in order            | 50                |
//!
//! A term that reaches none of the tiers rejects the whole name: terms
//! are AND-combined. Names that pass get a bonus of `50 - name length`
//! (floored at zero) so shorter names rank above longer ones.
//!
//! Comparisons are case-insensitive; lengths are counted in characters.

/// Characters after which a term counts as a word-boundary match.
const SEPARATORS: &[char] = &[' ', '_', '-', '.'];

const EXACT_SCORE: u32 = 1000;
const PREFIX_BASE: u32 = 500;
const PREFIX_PER_CHAR: u32 = 10;
const BOUNDARY_BASE: u32 = 300;
const BOUNDARY_PER_CHAR: u32 = 5;
const SUBSTRING_BASE: u32 = 100;
const SUBSTRING_PER_CHAR: u32 = 2;
const SUBSEQUENCE_SCORE: u32 = 50;
const SHORT_NAME_BONUS: u32 = 50;

/// Which tier a term matched in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    Prefix,
    Boundary,
    Substring,
    Subsequence,
}

impl MatchTier {
    /// Points this tier awards for a term of `term_len` characters.
    pub fn points(self, term_len: u32) -> u32 {
        match self {
            Self::Exact => EXACT_SCORE,
            Self::Prefix => PREFIX_BASE + PREFIX_PER_CHAR * term_len,
            Self::Boundary => BOUNDARY_BASE + BOUNDARY_PER_CHAR * term_len,
            Self::Substring => SUBSTRING_BASE + SUBSTRING_PER_CHAR * term_len,
            Self::Subsequence => SUBSEQUENCE_SCORE,
        }
    }
}

/// Grades one lowercase term against a lowercase name.
pub fn classify(name_lower: &str, term: &str) -> Option<MatchTier> {
    if term.is_empty() {
        return None;
    }
    if name_lower == term {
        Some(MatchTier::Exact)
    } else if name_lower.starts_with(term) {
        Some(MatchTier::Prefix)
    } else if follows_separator(name_lower, term) {
        Some(MatchTier::Boundary)
    } else if name_lower.contains(term) {
        Some(MatchTier::Substring)
    } else if is_subsequence(name_lower, term) {
        Some(MatchTier::Subsequence)
    } else {
        None
    }
}

/// Scores `name` against lowercase query terms. Zero means rejected.
///
/// Pure and stateless; safe to call from any number of threads.
pub fn score<S: AsRef<str>>(name: &str, terms: &[S]) -> u32 {
    let name_lower = name.to_lowercase();
    let mut total = 0u32;
    let mut matched_any = false;

    for term in terms {
        let term = term.as_ref();
        if term.is_empty() {
            continue;
        }
        match classify(&name_lower, term) {
            Some(tier) => {
                total += tier.points(term.chars().count() as u32);
                matched_any = true;
            }
            None => return 0,
        }
    }

    if !matched_any {
        return 0;
    }

    let name_len = name.chars().count() as u32;
    total + SHORT_NAME_BONUS.saturating_sub(name_len)
}

/// True when the characters of `pattern` appear in `text` in order.
pub fn is_subsequence(text: &str, pattern: &str) -> bool {
    let mut wanted = pattern.chars().peekable();
    for c in text.chars() {
        match wanted.peek() {
            Some(&p) if p == c => {
                wanted.next();
            }
            Some(_) => {}
            None => break,
        }
    }
    wanted.peek().is_none()
}

fn follows_separator(name_lower: &str, term: &str) -> bool {
    name_lower.match_indices(term).any(|(idx, _)| {
        name_lower[..idx]
            .chars()
            .next_back()
            .is_some_and(|c| SEPARATORS.contains(&c))
    })
}
