//! In-memory search over indexed log documents.
//!
//! [`SearchIndex`] owns one [`InvertedIndex`] and, unless disabled, one
//! [`FuzzyIndex`]. Three read-only strategies run over them:
//!
//! - [`SearchIndex::search`]: TF-IDF ranked term search
//! - [`SearchIndex::fuzzy_search`]: edit-distance matching on candidates
//! - [`SearchIndex::boolean_search`]: `AND` / `OR` / `NOT` set algebra
//!
//! The index itself carries no locking. Use [`SharedIndex`] when several
//! producers write concurrently.

pub mod boolean;
pub mod fuzzy;
pub mod inverted;
pub mod tokenizer;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::Fields;
use crate::ulid::Ulid;

pub use boolean::{BoolExpr, BoolOp, BooleanParser};
pub use fuzzy::FuzzyIndex;
pub use inverted::{InvertedIndex, Posting};
pub use tokenizer::Tokenizer;

/// Identifier of an indexed document.
pub type DocId = Ulid;

/// A document together with its relevance score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    /// Matching document
    pub doc_id: DocId,
    /// Relevance score (higher is better)
    pub score: f64,
}

impl ScoredDocument {
    /// Orders accumulated scores: descending score, ties by ascending ID.
    #[must_use]
    pub fn ranked(scores: HashMap<DocId, f64>) -> Vec<Self> {
        let mut results: Vec<Self> = scores
            .into_iter()
            .map(|(doc_id, score)| Self { doc_id, score })
            .collect();
        results.sort_by(|a, b| match b.score.total_cmp(&a.score) {
            Ordering::Equal => a.doc_id.cmp(&b.doc_id),
            other => other,
        });
        results
    }
}

/// Search index configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Maintain the fuzzy candidate set
    pub fuzzy: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { fuzzy: true }
    }
}

impl IndexConfig {
    /// Enables or disables fuzzy candidates.
    #[must_use]
    pub const fn with_fuzzy(mut self, fuzzy: bool) -> Self {
        self.fuzzy = fuzzy;
        self
    }
}

/// Composite index serving ranked, fuzzy and boolean search.
#[derive(Debug)]
pub struct SearchIndex {
    inverted: InvertedIndex,
    fuzzy: Option<FuzzyIndex>,
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchIndex {
    /// Creates an index with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&IndexConfig::default())
    }

    /// Creates an index with the given configuration.
    #[must_use]
    pub fn with_config(config: &IndexConfig) -> Self {
        Self {
            inverted: InvertedIndex::new(),
            fuzzy: config.fuzzy.then(FuzzyIndex::new),
        }
    }

    /// Registers a document with every strategy.
    pub fn add_document(&mut self, id: DocId, fields: &Fields) {
        self.inverted.add_document(id, fields);
        if let Some(fuzzy) = self.fuzzy.as_mut() {
            fuzzy.add_document(id, fields);
        }
    }

    /// Unwinds every posting and candidate of `id`.
    ///
    /// Returns false if the document was not registered.
    pub fn remove_document(&mut self, id: DocId) -> bool {
        let removed = self.inverted.remove_document(id);
        if let Some(fuzzy) = self.fuzzy.as_mut() {
            fuzzy.remove_document(id);
        }
        removed
    }

    /// TF-IDF ranked search.
    #[must_use]
    pub fn search(&self, query: &str, field: Option<&str>) -> Vec<ScoredDocument> {
        self.inverted.search(query, field)
    }

    /// Approximate search by normalized edit distance.
    ///
    /// Faults degrade to an empty result with a warning. Returns nothing when
    /// the fuzzy candidate set is disabled.
    #[must_use]
    pub fn fuzzy_search(&self, query: &str, threshold: f64, field: Option<&str>) -> Vec<ScoredDocument> {
        let Some(fuzzy) = self.fuzzy.as_ref() else {
            warn!(query, "fuzzy search requested but fuzzy index is disabled");
            return Vec::new();
        };
        fuzzy.search(query, threshold, field).unwrap_or_else(|e| {
            warn!(query, threshold, error = %e, "fuzzy search failed");
            Vec::new()
        })
    }

    /// Evaluates a boolean query, returning matching IDs in ascending order.
    ///
    /// A malformed query degrades to an empty result with a warning.
    #[must_use]
    pub fn boolean_search(&self, query: &str, field: Option<&str>) -> Vec<DocId> {
        match BooleanParser::parse(query) {
            Ok(expr) => {
                let mut hits: Vec<DocId> = boolean::evaluate(&expr, &self.inverted, field)
                    .into_iter()
                    .collect();
                hits.sort_unstable();
                hits
            }
            Err(e) => {
                warn!(query, error = %e, "boolean search failed");
                Vec::new()
            }
        }
    }

    /// Returns the underlying inverted index.
    #[must_use]
    pub const fn inverted(&self) -> &InvertedIndex {
        &self.inverted
    }

    /// Returns the fuzzy candidate set, if enabled.
    #[must_use]
    pub const fn fuzzy(&self) -> Option<&FuzzyIndex> {
        self.fuzzy.as_ref()
    }

    /// Returns the number of registered documents.
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.inverted.document_count()
    }

    /// Removes every document from every strategy.
    pub fn clear(&mut self) {
        self.inverted.clear();
        if let Some(fuzzy) = self.fuzzy.as_mut() {
            fuzzy.clear();
        }
    }
}

/// Index handle shared between producers and readers.
pub type SharedIndex = Arc<RwLock<SearchIndex>>;

/// Creates a new shared index.
#[must_use]
pub fn shared_index(config: &IndexConfig) -> SharedIndex {
    Arc::new(RwLock::new(SearchIndex::with_config(config)))
}
