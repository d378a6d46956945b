//! Text tokenization shared by every index strategy.

use std::collections::HashSet;

/// Words dropped from every field before indexing.
pub const STOP_WORDS: [&str; 10] = ["le", "la", "les", "de", "du", "des", "un", "une", "et", "est"];

/// Case-folding word tokenizer with a fixed stop-word set.
///
/// A word is a maximal run of alphanumeric characters or `_`.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    stop_words: HashSet<&'static str>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    /// Creates a tokenizer with the default stop words.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stop_words: STOP_WORDS.into_iter().collect(),
        }
    }

    /// Lower-cases and splits `text` into words, dropping stop words.
    #[must_use]
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|word| !word.is_empty() && !self.is_stop_word(word))
            .map(String::from)
            .collect()
    }

    /// Returns true if `word` is a stop word.
    #[must_use]
    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_handles_special_characters() {
        let tokens = Tokenizer::new().tokenize("Error: connection-failed (timeout=30s) user_id");
        assert_eq!(
            tokens,
            vec!["error", "connection", "failed", "timeout", "30s", "user_id"]
        );
    }

    #[test]
    fn tokenize_strips_stop_words() {
        let tokens = Tokenizer::new().tokenize("La connexion est perdue et le serveur redémarre");
        assert_eq!(tokens, vec!["connexion", "perdue", "serveur", "redémarre"]);
    }

    #[test]
    fn tokenize_keeps_short_words() {
        let tokens = Tokenizer::new().tokenize("a ok b");
        assert_eq!(tokens, vec!["a", "ok", "b"]);
    }

    #[test]
    fn tokenize_empty_input() {
        assert!(Tokenizer::new().tokenize("").is_empty());
        assert!(Tokenizer::new().tokenize("  --  ").is_empty());
    }

    #[test]
    fn stop_word_lookup() {
        let tokenizer = Tokenizer::new();
        assert!(tokenizer.is_stop_word("les"));
        assert!(!tokenizer.is_stop_word("login"));
    }
}
