//! Knowledge base retrieval.
//!
//! The `Retriever` trait is the seam the answer chain depends on. The
//! bundled `KeywordRetriever` ranks documents by query-term overlap; an
//! embedding-backed index can be swapped in behind the same trait.

use crate::error::RetrievalError;
use async_trait::async_trait;
use spectrum_compass_core::Result as CoreResult;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

/// Number of passages returned when no explicit bound is configured.
pub const DEFAULT_TOP_K: usize = 3;

/// Words too common to say anything about relevance.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "can", "do", "does", "for", "from",
    "how", "i", "if", "in", "is", "it", "me", "my", "of", "on", "or", "our", "so", "that", "the",
    "their", "there", "this", "to", "was", "what", "when", "where", "which", "who", "why", "will",
    "with", "you", "your",
];

/// Name shown for a passage with no `source` metadata.
pub const UNKNOWN_RESOURCE: &str = "Unknown Resource";

/// Metadata attached to a retrieved passage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageMetadata {
    /// Human-readable name of the resource the passage came from.
    #[serde(default)]
    pub source: Option<String>,
    /// Link to the resource, or the sentinel `"N/A"`.
    #[serde(default)]
    pub url: Option<String>,
}

/// A passage of knowledge base text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    /// The passage text handed to the model as context.
    pub text: String,
    /// Where the passage came from.
    #[serde(default)]
    pub metadata: PassageMetadata,
}

impl Passage {
    /// Creates a passage with no metadata.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: PassageMetadata::default(),
        }
    }

    /// Sets the source name.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.metadata.source = Some(source.into());
        self
    }

    /// Sets the resource URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.metadata.url = Some(url.into());
        self
    }
}

/// Trait for passage retrieval.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Returns the passages most relevant to `query`, best first.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying index cannot be searched.
    async fn retrieve(&self, query: &str) -> Result<Vec<Passage>, RetrievalError>;
}

/// On-disk knowledge base document.
#[derive(Debug, Deserialize)]
struct KnowledgeDocument {
    text: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Clone)]
struct IndexedPassage {
    passage: Passage,
    terms: HashMap<String, u32>,
}

/// In-memory retriever ranking passages by query-term overlap.
#[derive(Debug, Clone)]
pub struct KeywordRetriever {
    passages: Vec<IndexedPassage>,
    top_k: usize,
}

impl KeywordRetriever {
    /// Builds a retriever over the given passages.
    #[must_use]
    pub fn new(passages: Vec<Passage>, top_k: usize) -> Self {
        let passages = passages
            .into_iter()
            .map(|passage| {
                let mut terms = HashMap::new();
                for term in tokenize(&passage.text) {
                    *terms.entry(term).or_insert(0) += 1;
                }
                // Resource names are searchable too.
                if let Some(ref source) = passage.metadata.source {
                    for term in tokenize(source) {
                        *terms.entry(term).or_insert(0) += 1;
                    }
                }
                IndexedPassage { passage, terms }
            })
            .collect();

        Self { passages, top_k }
    }

    /// Loads a knowledge base from a JSON array of
    /// `{"text", "source", "url"}` documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// contains no documents with text.
    pub fn from_path(path: impl AsRef<Path>, top_k: usize) -> CoreResult<Self, RetrievalError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RetrievalError::KnowledgeBaseUnreadable {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        let documents: Vec<KnowledgeDocument> =
            serde_json::from_str(&raw).map_err(|e| RetrievalError::InvalidDocuments {
                reason: e.to_string(),
            })?;

        let passages: Vec<Passage> = documents
            .into_iter()
            .filter(|d| !d.text.trim().is_empty())
            .map(|d| Passage {
                text: d.text,
                metadata: PassageMetadata {
                    source: d.source,
                    url: d.url,
                },
            })
            .collect();

        if passages.is_empty() {
            return Err(RetrievalError::InvalidDocuments {
                reason: "knowledge base contains no passages".to_string(),
            }
            .into());
        }

        info!(
            path = %path.display(),
            passages = passages.len(),
            top_k,
            "Loaded knowledge base"
        );

        Ok(Self::new(passages, top_k))
    }

    /// Returns the number of indexed passages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    /// Returns whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    fn search(&self, query: &str) -> Vec<Passage> {
        let query_terms: HashSet<String> = tokenize(query).collect();
        if query_terms.is_empty() || self.top_k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(usize, u32, &IndexedPassage)> = self
            .passages
            .iter()
            .filter_map(|indexed| {
                let mut matched = 0usize;
                let mut occurrences = 0u32;
                for term in &query_terms {
                    if let Some(count) = indexed.terms.get(term) {
                        matched += 1;
                        occurrences += count;
                    }
                }
                (matched > 0).then_some((matched, occurrences, indexed))
            })
            .collect();

        // Stable sort: equal scores keep knowledge base order.
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));

        scored
            .into_iter()
            .take(self.top_k)
            .map(|(_, _, indexed)| indexed.passage.clone())
            .collect()
    }
}

#[async_trait]
impl Retriever for KeywordRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Passage>, RetrievalError> {
        let passages = self.search(query);
        debug!(matches = passages.len(), "Keyword retrieval finished");
        Ok(passages)
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
        .map(str::to_lowercase)
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn corpus() -> Vec<Passage> {
        vec![
            Passage::new("Speech therapy helps children build communication skills.")
                .with_source("Speech Basics")
                .with_url("https://example.org/speech"),
            Passage::new("An IEP is an individualized education program for school support.")
                .with_source("School Guide"),
            Passage::new("Occupational therapy and speech therapy are often combined in early intervention.")
                .with_source("Early Intervention")
                .with_url("N/A"),
            Passage::new("Respite care gives caregivers a short break.").with_source("Respite"),
        ]
    }

    #[tokio::test]
    async fn ranks_by_matched_terms() {
        let retriever = KeywordRetriever::new(corpus(), 3);
        let results = retriever
            .retrieve("speech therapy for early intervention")
            .await
            .expect("retrieve");

        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0].metadata.source.as_deref(),
            Some("Early Intervention")
        );
        assert_eq!(results[1].metadata.source.as_deref(), Some("Speech Basics"));
    }

    #[tokio::test]
    async fn respects_top_k() {
        let retriever = KeywordRetriever::new(corpus(), 1);
        let results = retriever.retrieve("therapy").await.expect("retrieve");
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn stop_word_only_query_matches_nothing() {
        let retriever = KeywordRetriever::new(corpus(), 3);
        let results = retriever.retrieve("what is the").await.expect("retrieve");
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn source_names_are_searchable() {
        let retriever = KeywordRetriever::new(corpus(), 3);
        let results = retriever.retrieve("respite").await.expect("retrieve");
        assert_eq!(results[0].metadata.source.as_deref(), Some("Respite"));
    }

    #[tokio::test]
    async fn matching_is_case_insensitive() {
        let retriever = KeywordRetriever::new(corpus(), 3);
        let results = retriever.retrieve("IEP").await.expect("retrieve");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].metadata.source.as_deref(), Some("School Guide"));
    }

    #[test]
    fn loads_documents_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"[
                {{"text": "Support groups meet monthly.", "source": "Parent Network", "url": "https://example.org/groups"}},
                {{"text": "   "}},
                {{"text": "Sensory-friendly events are listed weekly."}}
            ]"#
        )
        .expect("write");

        let retriever = KeywordRetriever::from_path(file.path(), 2).expect("load");
        assert_eq!(retriever.len(), 2);
        assert!(!retriever.is_empty());
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = KeywordRetriever::from_path("/nonexistent/knowledge.json", 3);
        assert!(result.is_err());
    }

    #[test]
    fn empty_knowledge_base_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, "[]").expect("write");
        assert!(KeywordRetriever::from_path(file.path(), 3).is_err());
    }

    #[test]
    fn passage_metadata_defaults_when_absent() {
        let passage: Passage =
            serde_json::from_str(r#"{"text": "Plain passage"}"#).expect("deserialize");
        assert_eq!(passage.metadata, PassageMetadata::default());
    }
}
