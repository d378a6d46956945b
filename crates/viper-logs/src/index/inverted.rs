//! Inverted index with TF-IDF ranking.
//!
//! Every `(term, field, document)` triple owns one [`Posting`] carrying the
//! term's positions inside the field and its normalized frequency. Ranking is
//! computed at query time:
//!
//! ```text
//! idf(t)      = ln((1 + N) / (1 + df(t))) + 1
//! score(d, q) = Σ_{t ∈ q} tf(t, d) · idf(t)
//! ```
//!
//! where `N` is the number of registered documents and `df(t)` the number of
//! documents with at least one posting for `t`.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tokenizer::Tokenizer;
use super::{DocId, ScoredDocument};
use crate::types::Fields;

/// Occurrence of a term inside one field of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    /// The indexed term
    pub term: String,
    /// Document containing the term
    pub doc_id: DocId,
    /// Field the term occurred in
    pub field: String,
    /// Token positions within the field (sorted, non-empty)
    pub positions: Vec<usize>,
    /// Occurrences divided by the field's token count
    pub term_frequency: f64,
}

/// Postings of one term for one document, keyed by field.
pub type FieldPostings = BTreeMap<String, Posting>;

/// Postings of one term across documents.
pub type TermPostings = HashMap<DocId, FieldPostings>;

/// Inverted index over document fields.
///
/// Mutation goes through `&mut self`; wrap in [`super::SharedIndex`] when
/// several producers need to write.
#[derive(Debug, Default)]
pub struct InvertedIndex {
    tokenizer: Tokenizer,
    /// term -> doc -> field -> posting
    postings: HashMap<String, TermPostings>,
    /// Registered documents and their fields
    documents: HashMap<DocId, Fields>,
    /// Terms each document has postings under, for removal
    doc_terms: HashMap<DocId, HashSet<String>>,
}

impl InvertedIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a document, creating one posting per `(term, field)`.
    ///
    /// Registering an ID again merges: postings for the same `(term, field)`
    /// are replaced, all others are kept.
    pub fn add_document(&mut self, id: DocId, fields: &Fields) {
        for (field, text) in fields {
            let tokens = self.tokenizer.tokenize(text);
            let token_count = tokens.len();

            let mut positions: HashMap<String, Vec<usize>> = HashMap::new();
            for (pos, term) in tokens.into_iter().enumerate() {
                positions.entry(term).or_default().push(pos);
            }

            for (term, positions) in positions {
                let posting = Posting {
                    term: term.clone(),
                    doc_id: id,
                    field: field.clone(),
                    term_frequency: positions.len() as f64 / token_count as f64,
                    positions,
                };
                self.postings
                    .entry(term.clone())
                    .or_default()
                    .entry(id)
                    .or_default()
                    .insert(field.clone(), posting);
                self.doc_terms.entry(id).or_default().insert(term);
            }
        }

        self.documents
            .entry(id)
            .or_default()
            .extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));

        debug!(doc_id = %id, fields = fields.len(), "indexed document");
    }

    /// Removes every posting referencing `id`, dropping terms left without postings.
    ///
    /// Returns false if the document was not registered.
    pub fn remove_document(&mut self, id: DocId) -> bool {
        if self.documents.remove(&id).is_none() {
            return false;
        }

        for term in self.doc_terms.remove(&id).unwrap_or_default() {
            if let Some(docs) = self.postings.get_mut(&term) {
                docs.remove(&id);
                if docs.is_empty() {
                    self.postings.remove(&term);
                }
            }
        }

        debug!(doc_id = %id, "removed document from index");
        true
    }

    /// Ranks documents against `query` by TF-IDF.
    ///
    /// Only postings from `field` count when it is given. Documents matching no
    /// query term are omitted. Results are sorted by descending score, ties by
    /// ascending ID.
    #[must_use]
    pub fn search(&self, query: &str, field: Option<&str>) -> Vec<ScoredDocument> {
        let mut scores: HashMap<DocId, f64> = HashMap::new();

        for term in self.tokenizer.tokenize(query) {
            let Some(docs) = self.postings.get(&term) else {
                continue;
            };
            let idf = self.idf(docs.len());

            for (doc_id, fields) in docs {
                for posting in fields.values() {
                    if field.is_none_or(|f| posting.field == f) {
                        *scores.entry(*doc_id).or_insert(0.0) += posting.term_frequency * idf;
                    }
                }
            }
        }

        ScoredDocument::ranked(scores)
    }

    /// Inverse document frequency for a term present in `docs_with_term` documents.
    #[must_use]
    pub fn idf(&self, docs_with_term: usize) -> f64 {
        let n = self.documents.len() as f64;
        ((1.0 + n) / (1.0 + docs_with_term as f64)).ln() + 1.0
    }

    /// Returns true if any document has a posting for `term`.
    #[must_use]
    pub fn contains_term(&self, term: &str) -> bool {
        self.postings.contains_key(term)
    }

    /// Returns all postings for `term`, ordered by document then field.
    #[must_use]
    pub fn postings(&self, term: &str) -> Vec<&Posting> {
        let Some(docs) = self.postings.get(term) else {
            return Vec::new();
        };
        let mut postings: Vec<&Posting> = docs.values().flat_map(BTreeMap::values).collect();
        postings.sort_by(|a, b| a.doc_id.cmp(&b.doc_id).then_with(|| a.field.cmp(&b.field)));
        postings
    }

    /// Iterates over every term and its postings.
    pub fn terms(&self) -> impl Iterator<Item = (&str, &TermPostings)> {
        self.postings.iter().map(|(term, docs)| (term.as_str(), docs))
    }

    /// Iterates over every registered document ID.
    pub fn document_ids(&self) -> impl Iterator<Item = DocId> + '_ {
        self.documents.keys().copied()
    }

    /// Returns the fields registered for a document.
    #[must_use]
    pub fn document(&self, id: DocId) -> Option<&Fields> {
        self.documents.get(&id)
    }

    /// Returns true if the document is registered.
    #[must_use]
    pub fn contains_document(&self, id: DocId) -> bool {
        self.documents.contains_key(&id)
    }

    /// Returns the number of distinct terms.
    #[must_use]
    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    /// Returns the number of registered documents.
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Returns the tokenizer used for documents and queries.
    #[must_use]
    pub const fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Removes every document and posting.
    pub fn clear(&mut self) {
        self.postings.clear();
        self.documents.clear();
        self.doc_terms.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ulid::Ulid;

    fn doc(n: u64) -> DocId {
        Ulid::new(n, 0).expect("valid id")
    }

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn add_document_records_positions_and_frequency() {
        let mut index = InvertedIndex::new();
        index.add_document(doc(1), &fields(&[("description", "disk full disk error")]));

        let postings = index.postings("disk");
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].positions, vec![0, 2]);
        assert!((postings[0].term_frequency - 0.5).abs() < 1e-12);
        assert_eq!(postings[0].field, "description");
        assert_eq!(postings[0].term, "disk");
    }

    #[test]
    fn one_posting_per_field() {
        let mut index = InvertedIndex::new();
        index.add_document(
            doc(1),
            &fields(&[("action", "login"), ("description", "login failed")]),
        );

        let postings = index.postings("login");
        assert_eq!(postings.len(), 2);
        assert_eq!(postings[0].field, "action");
        assert_eq!(postings[1].field, "description");
    }

    #[test]
    fn stop_words_are_not_indexed() {
        let mut index = InvertedIndex::new();
        index.add_document(doc(1), &fields(&[("description", "le serveur est lent")]));

        assert!(!index.contains_term("le"));
        assert!(!index.contains_term("est"));
        assert!(index.contains_term("serveur"));
        // Positions are counted after stop-word removal
        assert_eq!(index.postings("lent")[0].positions, vec![1]);
    }

    #[test]
    fn remove_document_unwinds_postings() {
        let mut index = InvertedIndex::new();
        index.add_document(doc(1), &fields(&[("description", "shared unique")]));
        index.add_document(doc(2), &fields(&[("description", "shared other")]));

        assert!(index.remove_document(doc(1)));

        assert!(!index.contains_term("unique"));
        assert!(index.contains_term("shared"));
        assert!(index.postings("shared").iter().all(|p| p.doc_id != doc(1)));
        assert!(index.search("unique", None).is_empty());
        assert_eq!(index.document_count(), 1);
    }

    #[test]
    fn remove_unknown_document_is_noop() {
        let mut index = InvertedIndex::new();
        index.add_document(doc(1), &fields(&[("description", "hello")]));
        assert!(!index.remove_document(doc(9)));
        assert_eq!(index.term_count(), 1);
    }

    #[test]
    fn idf_formula() {
        let mut index = InvertedIndex::new();
        index.add_document(doc(1), &fields(&[("d", "alpha")]));
        index.add_document(doc(2), &fields(&[("d", "beta")]));
        index.add_document(doc(3), &fields(&[("d", "beta")]));

        let expected = (4.0f64 / 2.0).ln() + 1.0;
        assert!((index.idf(1) - expected).abs() < 1e-12);
        assert!((index.idf(3) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn search_ranks_by_tfidf() {
        let mut index = InvertedIndex::new();
        index.add_document(doc(1), &fields(&[("description", "timeout")]));
        index.add_document(doc(2), &fields(&[("description", "timeout while connecting upstream")]));
        index.add_document(doc(3), &fields(&[("description", "all good")]));

        let results = index.search("timeout", None);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].doc_id, doc(1));
        assert_eq!(results[1].doc_id, doc(2));
        assert!(results[0].score > results[1].score);

        let idf = (4.0f64 / 3.0).ln() + 1.0;
        assert!((results[0].score - idf).abs() < 1e-12);
        assert!((results[1].score - 0.25 * idf).abs() < 1e-12);
    }

    #[test]
    fn search_accumulates_across_terms_and_fields() {
        let mut index = InvertedIndex::new();
        index.add_document(
            doc(1),
            &fields(&[("action", "login"), ("description", "login failed")]),
        );
        index.add_document(doc(2), &fields(&[("description", "failed backup")]));

        let results = index.search("login failed", None);
        assert_eq!(results[0].doc_id, doc(1));
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn search_restricted_to_field() {
        let mut index = InvertedIndex::new();
        index.add_document(doc(1), &fields(&[("component", "auth"), ("description", "ok")]));
        index.add_document(doc(2), &fields(&[("component", "db"), ("description", "auth token expired")]));

        let results = index.search("auth", Some("component"));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].doc_id, doc(1));

        assert!(index.search("auth", Some("missing")).is_empty());
    }

    #[test]
    fn search_is_case_insensitive() {
        let mut index = InvertedIndex::new();
        index.add_document(doc(1), &fields(&[("level", "ERROR")]));
        assert_eq!(index.search("error", None).len(), 1);
        assert_eq!(index.search("Error", None).len(), 1);
    }

    #[test]
    fn search_excludes_non_matching_documents() {
        let mut index = InvertedIndex::new();
        index.add_document(doc(1), &fields(&[("d", "alpha")]));
        index.add_document(doc(2), &fields(&[("d", "beta")]));

        let results = index.search("alpha gamma", None);
        assert_eq!(results.len(), 1);
        assert!(index.search("", None).is_empty());
    }

    #[test]
    fn clear_empties_everything() {
        let mut index = InvertedIndex::new();
        index.add_document(doc(1), &fields(&[("d", "alpha")]));
        index.clear();
        assert_eq!(index.term_count(), 0);
        assert_eq!(index.document_count(), 0);
        assert!(index.document(doc(1)).is_none());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        const WORDS: [&str; 6] = ["alpha", "beta", "gamma", "delta", "omega", "sigma"];

        fn text() -> impl Strategy<Value = String> {
            prop::collection::vec(prop::sample::select(WORDS.to_vec()), 1..8)
                .prop_map(|words| words.join(" "))
        }

        proptest! {
            #[test]
            fn scores_are_non_negative(docs in prop::collection::vec(text(), 1..10), query in text()) {
                let mut index = InvertedIndex::new();
                for (i, body) in docs.iter().enumerate() {
                    index.add_document(doc(i as u64), &fields(&[("d", body.as_str())]));
                }
                for hit in index.search(&query, None) {
                    prop_assert!(hit.score > 0.0);
                }
            }

            #[test]
            fn removal_leaves_no_trace(docs in prop::collection::vec(text(), 1..10), victim in 0usize..10) {
                let mut index = InvertedIndex::new();
                for (i, body) in docs.iter().enumerate() {
                    index.add_document(doc(i as u64), &fields(&[("d", body.as_str())]));
                }
                let victim = doc((victim % docs.len()) as u64);
                index.remove_document(victim);

                for (term, postings) in index.terms() {
                    prop_assert!(!postings.is_empty(), "empty term key {}", term);
                    prop_assert!(!postings.contains_key(&victim));
                }
            }

            #[test]
            fn more_occurrences_never_lower_score(extra in 1usize..5, others in prop::collection::vec(text(), 0..5)) {
                // Same token count, more occurrences of the query term
                let base = "alpha beta beta beta beta beta";
                let boosted_words: Vec<&str> = (0..6).map(|i| if i <= extra { "alpha" } else { "beta" }).collect();
                let boosted = boosted_words.join(" ");

                let score_for = |body: &str| {
                    let mut index = InvertedIndex::new();
                    index.add_document(doc(0), &fields(&[("d", body)]));
                    for (i, other) in others.iter().enumerate() {
                        index.add_document(doc(i as u64 + 1), &fields(&[("d", other.as_str())]));
                    }
                    index
                        .search("alpha", None)
                        .into_iter()
                        .find(|hit| hit.doc_id == doc(0))
                        .map_or(0.0, |hit| hit.score)
                };

                prop_assert!(score_for(&boosted) >= score_for(base));
            }
        }
    }
}
