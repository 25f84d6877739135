//! Feature extraction: subject/body text to a term-frequency map.
//!
//! The tokenizer is intentionally crude. Folder profiles are built from the
//! same extraction, so training and classification stay symmetric.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    // Runs of 3-15 lowercase letters, applied after case folding.
    static ref WORD_PATTERN: Regex = Regex::new(r"\b[a-z]{3,15}\b").unwrap();
}

/// Common words that carry no signal for folder classification.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "you", "your", "have", "with", "this", "that", "are", "from",
];

/// Token -> occurrence count within one unit of text.
pub type FeatureMap = HashMap<String, u32>;

/// Extract a term-frequency map from a subject line and optional body text.
///
/// Pure and deterministic: the same input always produces the same map, and
/// the returned map is owned by the caller.
pub fn extract(subject: &str, body: Option<&str>) -> FeatureMap {
    let mut text = subject.to_lowercase();
    if let Some(body) = body {
        text.push(' ');
        text.push_str(&body.to_lowercase());
    }

    let mut features = FeatureMap::new();
    for word in WORD_PATTERN.find_iter(&text) {
        let word = word.as_str();
        if STOP_WORDS.contains(&word) {
            continue;
        }
        *features.entry(word.to_string()).or_insert(0) += 1;
    }

    features
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_counts_and_stopwords() {
        let features = extract("Job REJECTED - your application", None);

        let mut expected = FeatureMap::new();
        expected.insert("job".to_string(), 1);
        expected.insert("rejected".to_string(), 1);
        expected.insert("application".to_string(), 1);
        assert_eq!(features, expected);
    }

    #[test]
    fn test_extract_combines_subject_and_body() {
        let features = extract("Interview invitation", Some("interview scheduled tomorrow"));
        assert_eq!(features.get("interview"), Some(&2));
        assert_eq!(features.get("scheduled"), Some(&1));
        assert_eq!(features.get("tomorrow"), Some(&1));
    }

    #[test]
    fn test_extract_word_length_bounds() {
        // Two-letter words and 16+ letter runs are dropped by the tokenizer.
        let features = extract("at pneumonoultramicroscopic cat", None);
        assert_eq!(features.len(), 1);
        assert_eq!(features.get("cat"), Some(&1));
    }

    #[test]
    fn test_extract_ignores_digits_and_punctuation() {
        let features = extract("RE: [ticket-4521] payment!!! overdue", None);
        assert_eq!(features.get("ticket"), Some(&1));
        assert_eq!(features.get("payment"), Some(&1));
        assert_eq!(features.get("overdue"), Some(&1));
        assert!(!features.contains_key("4521"));
    }

    #[test]
    fn test_extract_is_pure() {
        let a = extract("Offer letter enclosed", Some("congratulations on the offer"));
        let b = extract("Offer letter enclosed", Some("congratulations on the offer"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_extract_empty_input() {
        assert!(extract("", None).is_empty());
    }
}
