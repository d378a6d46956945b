//! Typo-tolerant matching by edit distance.
//!
//! Each registered document contributes candidates: every whole field value
//! and every word token, lower-cased. A query is compared against *every*
//! distinct candidate, so one search costs
//! `O(vocabulary × |query| × |candidate|)`. This is fine for the corpus sizes a
//! single process indexes, but it does not scale to large vocabularies.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::tokenizer::Tokenizer;
use super::{DocId, ScoredDocument};
use crate::error::{LogError, Result};
use crate::types::Fields;

/// Candidate registrations for one candidate string: doc -> fields it came from.
type Owners = HashMap<DocId, BTreeSet<String>>;

/// Candidate set for approximate matching.
#[derive(Debug, Default)]
pub struct FuzzyIndex {
    tokenizer: Tokenizer,
    candidates: HashMap<String, Owners>,
    doc_candidates: HashMap<DocId, HashSet<String>>,
}

impl FuzzyIndex {
    /// Creates an empty candidate set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the whole value and each word of every field as candidates.
    ///
    /// Registration is idempotent.
    pub fn add_document(&mut self, id: DocId, fields: &Fields) {
        for (field, text) in fields {
            self.register(text.to_lowercase(), id, field);
            for token in self.tokenizer.tokenize(text) {
                self.register(token, id, field);
            }
        }
    }

    /// Drops every candidate registration of `id`.
    pub fn remove_document(&mut self, id: DocId) -> bool {
        let Some(owned) = self.doc_candidates.remove(&id) else {
            return false;
        };
        for candidate in owned {
            if let Some(owners) = self.candidates.get_mut(&candidate) {
                owners.remove(&id);
                if owners.is_empty() {
                    self.candidates.remove(&candidate);
                }
            }
        }
        true
    }

    /// Scores documents by summed similarity of candidates at or above `threshold`.
    ///
    /// Each qualifying candidate adds its similarity once per owning document.
    /// With `field`, only candidates registered from that field count.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Query`] if `threshold` is not a finite number.
    pub fn search(&self, query: &str, threshold: f64, field: Option<&str>) -> Result<Vec<ScoredDocument>> {
        if !threshold.is_finite() {
            return Err(LogError::query(format!("fuzzy threshold must be finite, got {threshold}")));
        }

        let query = query.to_lowercase();
        let mut scores: HashMap<DocId, f64> = HashMap::new();

        for (candidate, owners) in &self.candidates {
            let score = similarity(&query, candidate);
            if score < threshold {
                continue;
            }
            for (doc_id, fields) in owners {
                if field.is_none_or(|f| fields.contains(f)) {
                    *scores.entry(*doc_id).or_insert(0.0) += score;
                }
            }
        }

        Ok(ScoredDocument::ranked(scores))
    }

    /// Returns true if `candidate` (already lower-cased) is registered.
    #[must_use]
    pub fn contains_candidate(&self, candidate: &str) -> bool {
        self.candidates.contains_key(candidate)
    }

    /// Returns the number of distinct candidates.
    #[must_use]
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Removes every candidate.
    pub fn clear(&mut self) {
        self.candidates.clear();
        self.doc_candidates.clear();
    }

    fn register(&mut self, candidate: String, id: DocId, field: &str) {
        if candidate.is_empty() {
            return;
        }
        self.doc_candidates
            .entry(id)
            .or_default()
            .insert(candidate.clone());
        self.candidates
            .entry(candidate)
            .or_default()
            .entry(id)
            .or_default()
            .insert(field.to_string());
    }
}

/// Levenshtein distance between two strings, counted in characters.
#[must_use]
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };

    if short.is_empty() {
        return long.len();
    }

    let mut prev_row: Vec<usize> = (0..=short.len()).collect();
    let mut curr_row = vec![0; short.len() + 1];

    for (i, lc) in long.iter().enumerate() {
        curr_row[0] = i + 1;
        for (j, sc) in short.iter().enumerate() {
            let cost = usize::from(lc != sc);
            curr_row[j + 1] = (prev_row[j + 1] + 1) // deletion
                .min(curr_row[j] + 1) // insertion
                .min(prev_row[j] + cost); // substitution
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[short.len()]
}

/// Normalized similarity in `[0, 1]`: `1 - distance / max_len`.
///
/// Two empty strings are identical.
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - edit_distance(a, b) as f64 / max_len as f64
}
