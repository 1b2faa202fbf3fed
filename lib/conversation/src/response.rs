//! Splits raw generator output into an answer and follow-up suggestions.
//!
//! The model is asked to end its answer with a line like
//! `SUGGESTIONS: q1 | q2 | q3`. The format comes from an untrusted source, so
//! parsing never fails: anything unexpected degrades to fewer suggestions.

use serde::{Deserialize, Serialize};
use spectrum_compass_ai::{SUGGESTIONS_DELIMITER, SUGGESTIONS_MARKER};

/// A raw answer split into its visible text and suggestion chips.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedResponse {
    /// The answer with the suggestion directive removed, trimmed.
    pub clean_answer: String,
    /// Follow-up questions, in order, each trimmed and non-empty.
    pub suggestions: Vec<String>,
}

/// Parses a raw answer.
///
/// Only the first marker splits; later occurrences stay inside the
/// suggestion text.
#[must_use]
pub fn parse_response(raw: &str) -> ParsedResponse {
    let Some((answer, tail)) = raw.split_once(SUGGESTIONS_MARKER) else {
        return ParsedResponse {
            clean_answer: raw.trim().to_string(),
            suggestions: Vec::new(),
        };
    };

    let suggestions = tail
        .trim()
        .split(SUGGESTIONS_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    ParsedResponse {
        clean_answer: answer.trim().to_string(),
        suggestions,
    }
}
