//! Question tokenization and keyword normalization for the keyword fallback.

use std::collections::{BTreeSet, HashSet};

pub const DEFAULT_STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "has", "have", "his", "how", "its", "may", "new", "now", "old", "see",
    "two", "who", "did", "does", "get", "him", "let", "say", "she", "too", "use", "what",
    "when", "where", "which", "while", "why", "with", "about", "from", "into", "that", "than",
    "then", "there", "these", "they", "this", "those", "were", "will", "would", "could",
    "should", "been", "being", "their", "them", "your", "yours", "also", "some", "such",
    "only", "over", "very", "just", "more", "most", "other", "each", "tell", "please",
    "document", "text",
];

#[must_use]
pub fn default_stop_words() -> BTreeSet<String> {
    DEFAULT_STOP_WORDS.iter().map(|w| (*w).to_owned()).collect()
}

/// Lowercase words longer than two characters, punctuation stripped, stop words removed.
///
/// Each word appears once, in first-occurrence order.
#[must_use]
pub fn tokenize_question(question: &str, stop_words: &BTreeSet<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    question
        .split_whitespace()
        .map(|raw| {
            raw.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|w| w.chars().count() > 2 && !stop_words.contains(w))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

/// Lowercase, trim, and deduplicate keywords, keeping first-occurrence order.
#[must_use]
pub fn normalize_keywords<I, S>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    keywords
        .into_iter()
        .map(|k| k.as_ref().trim().to_lowercase())
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_strips_punctuation_and_short_words() {
        let words = tokenize_question("What is the PRICING, for Q4?", &default_stop_words());
        assert_eq!(words, ["pricing"]);
    }

    #[test]
    fn tokenize_dedups_repeated_words() {
        let words = tokenize_question("revenue revenue Revenue growth", &default_stop_words());
        assert_eq!(words, ["revenue", "growth"]);
    }

    #[test]
    fn tokenize_with_empty_stop_words_keeps_everything_long_enough() {
        let words = tokenize_question("the cat is out", &BTreeSet::new());
        assert_eq!(words, ["the", "cat", "out"]);
    }

    #[test]
    fn tokenize_handles_unicode() {
        let words = tokenize_question("Überblick über Preise", &BTreeSet::new());
        assert_eq!(words, ["überblick", "über", "preise"]);
    }

    #[test]
    fn normalize_lowercases_and_dedups() {
        let kws = normalize_keywords(["Pricing", " pricing ", "", "Revenue"]);
        assert_eq!(kws, ["pricing", "revenue"]);
    }
}
