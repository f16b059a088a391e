//! Error types and utilities shared across the venue-route toolkit
//!
//! Provides the common error enum and fuzzy matching for user-supplied names
//! (way types, level ids, speed preferences) so that a typo in a request comes
//! back with a "did you mean" hint instead of a bare rejection.

use strsim::{jaro_winkler, normalized_levenshtein};
use thiserror::Error;

/// Minimum combined similarity for a suggestion to be offered.
///
/// Tuned so that transpositions ("stiars") and single deletions ("elevtor")
/// are caught while unrelated words ("basement") are not.
const MIN_SUGGESTION_SCORE: f64 = 0.72;

/// Find the closest candidate to `input` using a blend of Jaro-Winkler and
/// normalized Levenshtein similarity.
///
/// Scoring:
/// - 70% Jaro-Winkler (transpositions, shared prefixes)
/// - 30% normalized Levenshtein (insertions, deletions)
/// - up to +15% when the first four characters agree closely
/// - up to +10% when compound names ("freight-elevator") contain a close part
///
/// Returns `None` for exact (case-insensitive) matches and when nothing clears
/// the threshold.
pub fn suggest_name<S: AsRef<str>>(input: &str, candidates: &[S]) -> Option<String> {
    let input_lower = input.trim().to_lowercase();
    if input_lower.is_empty() {
        return None;
    }

    if candidates
        .iter()
        .any(|c| c.as_ref().eq_ignore_ascii_case(&input_lower))
    {
        return None;
    }

    let mut best: Option<(f64, &str)> = None;

    for candidate in candidates {
        let candidate = candidate.as_ref();
        let candidate_lower = candidate.to_lowercase();

        let jw_score = jaro_winkler(&input_lower, &candidate_lower);
        let lev_score = normalized_levenshtein(&input_lower, &candidate_lower);
        let mut score = jw_score * 0.7 + lev_score * 0.3;

        let prefix_len = input_lower.chars().count().min(4);
        if prefix_len == 4 {
            let input_prefix: String = input_lower.chars().take(prefix_len).collect();
            let candidate_prefix: String = candidate_lower.chars().take(prefix_len).collect();
            let prefix_similarity = normalized_levenshtein(&input_prefix, &candidate_prefix);
            if prefix_similarity > 0.7 {
                score += 0.15 * prefix_similarity;
            }
        }

        if candidate_lower.contains('-') || candidate_lower.contains('_') {
            for part in candidate_lower.split(['-', '_']) {
                if part.len() >= 4 {
                    let part_similarity = jaro_winkler(&input_lower, part);
                    if part_similarity > 0.85 {
                        score += 0.1 * part_similarity;
                    }
                }
            }
        }

        // Strictly greater keeps the first candidate on ties, so the answer
        // depends only on candidate order.
        let better = match best {
            Some((best_score, _)) => score > best_score,
            None => true,
        };
        if score >= MIN_SUGGESTION_SCORE && better {
            best = Some((score, candidate));
        }
    }

    best.map(|(_, name)| name.to_string())
}

/// Render an optional suggestion as a message suffix.
pub fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(" (did you mean '{name}'?)"),
        None => String::new(),
    }
}

/// Main error type for venue-route operations that are not specific to one
/// subsystem
#[derive(Debug, Error)]
pub enum Error {
    /// A named entity (way type, level, space, ...) is not known
    #[error("unknown {kind} '{name}'{}", did_you_mean(.suggestion))]
    UnknownName {
        kind: &'static str,
        name: String,
        suggestion: Option<String>,
    },

    /// Malformed JSON payload or file
    #[error("parse error: {0}")]
    Parse(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build an `UnknownName` error, attaching a fuzzy suggestion from `known`.
    pub fn unknown_name<S: AsRef<str>>(kind: &'static str, name: &str, known: &[S]) -> Self {
        Error::UnknownName {
            kind,
            name: name.to_string(),
            suggestion: suggest_name(name, known),
        }
    }
}

/// Convenience result type for venue-route operations
pub type Result<T> = std::result::Result<T, Error>;
