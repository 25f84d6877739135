//! Scoring a message's features against every folder profile.
//!
//! The score is a plain weighted overlap: for each distinct term in the
//! message, add the profile's accumulated count for that term. No smoothing,
//! no idf weighting. Confidence is the winning label's share of the total
//! score across all labels, a relative-share heuristic rather than a
//! calibrated probability.

use crate::features;
use crate::model::Model;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    Folder(String),
    Unknown,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Folder(name) => f.write_str(name),
            Label::Unknown => f.write_str("unknown"),
        }
    }
}

/// Ephemeral result of classifying one message.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: Label,
    /// Winning score / total score, in [0, 1]. Reported even when the label
    /// is downgraded to `Unknown` for falling below the threshold.
    pub confidence: f64,
}

impl Classification {
    fn unknown(confidence: f64) -> Self {
        Self {
            label: Label::Unknown,
            confidence,
        }
    }
}

pub struct Classifier<'a> {
    model: &'a Model,
    min_confidence: f64,
}

impl<'a> Classifier<'a> {
    pub fn new(model: &'a Model, min_confidence: f64) -> Self {
        Self {
            model,
            min_confidence,
        }
    }

    /// Classify a message by subject and optional body snippet.
    pub fn classify(&self, subject: &str, body: Option<&str>) -> Classification {
        let features = features::extract(subject, body);

        if self.model.is_empty() {
            return Classification::unknown(0.0);
        }

        // Labels iterate in lexicographic order (BTreeMap), so ties resolve
        // to the smallest label deterministically via the strict comparison.
        let mut best: Option<(&str, u64)> = None;
        let mut total: u64 = 0;
        for (label, profile) in &self.model.profiles {
            let score: u64 = features
                .keys()
                .map(|term| profile.get(term).copied().unwrap_or(0))
                .sum();
            total += score;
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((label, score));
            }
        }

        if total == 0 {
            return Classification::unknown(0.0);
        }

        let (label, score) = best.expect("non-empty model yields a best label");
        let confidence = score as f64 / total as f64;
        if confidence < self.min_confidence {
            return Classification::unknown(confidence);
        }

        Classification {
            label: Label::Folder(label.to_string()),
            confidence,
        }
    }
}
