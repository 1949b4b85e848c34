//! Keyword extraction and candidate shortlisting
//!
//! Turns free text into a set of normalized keywords and keeps the endpoints
//! whose path or description contains any of them as a substring.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::IntentError;
use crate::spec::{EndpointRecord, SchemaIndex};

/// Stop words dropped from user text before matching.
///
/// Words of three characters or fewer ("how", "the", "and", "for") are already
/// removed by the length filter; they are listed so the set stays valid if
/// `min_token_len` is lowered.
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    "what", "how", "the", "and", "for", "about", "does", "from", "have", "into", "need", "please",
    "should", "that", "this", "want", "when", "where", "which", "with", "would", "your",
];

/// Tokens shorter than this (in characters) are dropped.
pub const DEFAULT_MIN_TOKEN_LEN: usize = 4;

/// Tuning for keyword extraction.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct SelectorConfig {
    /// Minimum token length in characters
    pub min_token_len: usize,
    /// Lower-cased words that never become keywords
    pub stop_words: BTreeSet<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_token_len: DEFAULT_MIN_TOKEN_LEN,
            stop_words: DEFAULT_STOP_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }
}

impl SelectorConfig {
    /// Set the minimum token length.
    pub fn min_token_len(mut self, len: usize) -> Self {
        self.min_token_len = len;
        self
    }

    /// Replace the stop-word set.
    pub fn stop_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stop_words = words
            .into_iter()
            .map(|w| w.as_ref().to_lowercase())
            .collect();
        self
    }
}

/// Keywords and shortlisted endpoints for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedInput<'a> {
    pub keywords: BTreeSet<String>,
    /// Borrowed from the index, in index order
    pub candidates: Vec<&'a EndpointRecord>,
}

/// Extract keywords from `text` and shortlist matching endpoints.
pub fn select_candidates<'a>(
    text: &str,
    index: &'a SchemaIndex,
    config: &SelectorConfig,
) -> Result<AnalyzedInput<'a>, IntentError> {
    if text.trim().is_empty() {
        return Err(IntentError::InvalidInput);
    }

    let keywords = extract_keywords(text, config);
    let candidates: Vec<&EndpointRecord> = index
        .endpoints()
        .iter()
        .filter(|e| matches_any(e, &keywords))
        .collect();

    debug!(
        keywords = ?keywords,
        candidates = candidates.len(),
        "shortlisted endpoints"
    );

    Ok(AnalyzedInput {
        keywords,
        candidates,
    })
}

/// Lower-case, split on whitespace, strip surrounding punctuation, and drop
/// short tokens and stop words.
pub fn extract_keywords(text: &str, config: &SelectorConfig) -> BTreeSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|t| t.chars().count() >= config.min_token_len)
        .filter(|t| !config.stop_words.contains(*t))
        .map(str::to_string)
        .collect()
}

fn matches_any(endpoint: &EndpointRecord, keywords: &BTreeSet<String>) -> bool {
    let description = endpoint.description.to_lowercase();
    let path = endpoint.path.to_lowercase();
    keywords
        .iter()
        .any(|k| description.contains(k.as_str()) || path.contains(k.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> SchemaIndex {
        SchemaIndex::from(vec![
            EndpointRecord::new("/password/reset", "post", "Reset a user's password"),
            EndpointRecord::new("/users/list", "get", "List all users"),
            EndpointRecord::new("/orders/{id}", "get", "Fetch one order"),
        ])
    }

    // -- extract_keywords --

    #[test]
    fn extract_keywords_drops_short_tokens_and_stop_words() {
        let keywords = extract_keywords("how do I reset my password", &SelectorConfig::default());
        let expected: BTreeSet<String> = ["password", "reset"].iter().map(|s| s.to_string()).collect();
        assert_eq!(keywords, expected);
    }

    #[test]
    fn extract_keywords_lowercases_and_strips_punctuation() {
        let keywords = extract_keywords("What ORDERS exist?", &SelectorConfig::default());
        assert!(keywords.contains("orders"));
        assert!(keywords.contains("exist"));
        assert!(!keywords.contains("what"));
        assert_eq!(keywords.len(), 2);
    }

    #[test]
    fn extract_keywords_length_boundary() {
        // three characters is dropped, four is kept
        let keywords = extract_keywords("get user", &SelectorConfig::default());
        assert_eq!(keywords.len(), 1);
        assert!(keywords.contains("user"));
    }

    #[test]
    fn extract_keywords_respects_custom_config() {
        let config = SelectorConfig::default()
            .min_token_len(2)
            .stop_words(["Reset"]);
        let keywords = extract_keywords("reset my password", &config);
        let expected: BTreeSet<String> = ["my", "password"].iter().map(|s| s.to_string()).collect();
        assert_eq!(keywords, expected);
    }

    // -- select_candidates --

    #[test]
    fn select_shortlists_only_password_reset() {
        let index = sample_index();
        let analyzed =
            select_candidates("how do I reset my password", &index, &SelectorConfig::default())
                .unwrap();

        assert_eq!(analyzed.candidates.len(), 1);
        assert_eq!(analyzed.candidates[0].path, "/password/reset");
    }

    #[test]
    fn select_candidates_are_references_into_index() {
        let index = sample_index();
        let analyzed =
            select_candidates("list users", &index, &SelectorConfig::default()).unwrap();

        assert_eq!(analyzed.candidates.len(), 1);
        assert!(std::ptr::eq(analyzed.candidates[0], &index.endpoints()[1]));
    }

    #[test]
    fn select_matches_keyword_as_substring_of_path() {
        let index = SchemaIndex::from(vec![EndpointRecord::new("/passwords", "get", "")]);
        let config = SelectorConfig::default();
        let analyzed = select_candidates("pass", &index, &config).unwrap();
        assert_eq!(analyzed.candidates.len(), 1);
    }

    #[test]
    fn select_keeps_index_order() {
        let index = sample_index();
        let analyzed = select_candidates(
            "users orders password",
            &index,
            &SelectorConfig::default(),
        )
        .unwrap();

        let paths: Vec<&str> = analyzed.candidates.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, ["/password/reset", "/users/list", "/orders/{id}"]);
    }

    #[test]
    fn select_returns_empty_shortlist_when_nothing_matches() {
        let index = sample_index();
        let analyzed =
            select_candidates("weather forecast tomorrow", &index, &SelectorConfig::default())
                .unwrap();
        assert!(analyzed.candidates.is_empty());
        assert_eq!(analyzed.keywords.len(), 3);
    }

    #[test]
    fn select_with_only_stop_words_matches_nothing() {
        let index = sample_index();
        let analyzed =
            select_candidates("how do I", &index, &SelectorConfig::default()).unwrap();
        assert!(analyzed.keywords.is_empty());
        assert!(analyzed.candidates.is_empty());
    }

    #[test]
    fn select_never_returns_candidate_without_a_keyword() {
        let index = sample_index();
        let config = SelectorConfig::default();
        for text in ["reset everything", "list orders", "fetch password", "users"] {
            let analyzed = select_candidates(text, &index, &config).unwrap();
            for c in &analyzed.candidates {
                let haystack = format!("{} {}", c.path.to_lowercase(), c.description.to_lowercase());
                assert!(
                    analyzed.keywords.iter().any(|k| haystack.contains(k.as_str())),
                    "{} matched without a keyword for {text:?}",
                    c.path
                );
            }
        }
    }

    #[test]
    fn select_is_deterministic() {
        let index = sample_index();
        let config = SelectorConfig::default();
        let a = select_candidates("reset orders for users", &index, &config).unwrap();
        let b = select_candidates("reset orders for users", &index, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn select_rejects_blank_text() {
        let index = sample_index();
        let config = SelectorConfig::default();
        assert!(matches!(
            select_candidates("", &index, &config),
            Err(IntentError::InvalidInput)
        ));
        assert!(matches!(
            select_candidates(" \t\n", &index, &config),
            Err(IntentError::InvalidInput)
        ));
    }
}
