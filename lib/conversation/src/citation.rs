//! Citations derived from the passages an answer was conditioned on.

use crate::message::Citation;
use spectrum_compass_ai::{Passage, UNKNOWN_RESOURCE};
use std::collections::HashSet;

/// Builds the deduplicated citation list for a set of passages.
///
/// Two passages cite the same resource when their rendered citations are
/// identical. The first occurrence wins and order is preserved.
#[must_use]
pub fn citations_from_passages(passages: &[Passage]) -> Vec<Citation> {
    let mut seen = HashSet::new();
    passages
        .iter()
        .map(|p| {
            let name = p.metadata.source.as_deref().unwrap_or(UNKNOWN_RESOURCE);
            Citation::new(name, p.metadata.url.clone())
        })
        .filter(|c| seen.insert(c.render()))
        .collect()
}
