//! Core types and error handling for Stackyard.
//!
//! - [`StackyardError`]: strongly-typed failures of the resolution and ordering engines
//! - [`ErrorContext`] / [`user_friendly_error`]: colored CLI reporting with suggestions
//! - [`suggest_similar`]: "did you mean" candidates for failed lookups

pub mod error;

pub use error::{ErrorContext, StackyardError, user_friendly_error};

use strsim::levenshtein;

/// Maximum allowed Levenshtein distance as a percentage of target length for suggestions.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// Return up to three candidates close to `target`, closest first.
pub fn suggest_similar<'a, I>(target: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut scored: Vec<(String, usize)> = candidates
        .into_iter()
        .map(|candidate| (candidate.to_string(), levenshtein(target, candidate)))
        .collect();

    scored.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    scored
        .into_iter()
        .filter(|(_, dist)| *dist <= target.len().max(1) * SIMILARITY_THRESHOLD_PERCENT / 100)
        .take(3)
        .map(|(candidate, _)| candidate)
        .collect()
}
