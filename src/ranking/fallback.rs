use rapidfuzz::distance::jaro_winkler;

use crate::ranking::{top_k, NameMatcher, ScoredName};

/// Rapidfuzz-based matcher (fallback when TF-IDF finds nothing)
///
/// Tolerates typos that produce no shared TF-IDF terms, e.g. "chiken".
pub struct FuzzyMatcher {
    names: Vec<String>,
    /// Minimum score in percent (0-100)
    min_score: f64,
}

impl FuzzyMatcher {
    pub fn new<S: AsRef<str>>(names: &[S], min_score: f64) -> Self {
        Self {
            names: names.iter().map(|n| n.as_ref().to_lowercase()).collect(),
            min_score,
        }
    }
}

impl NameMatcher for FuzzyMatcher {
    fn match_names(&self, query: &str, limit: usize) -> Vec<ScoredName> {
        let query_lower = query.trim().to_lowercase();
        if query_lower.is_empty() {
            return Vec::new();
        }

        let scored = self.names.iter().enumerate().filter_map(|(row, name)| {
            // Jaro-Winkler similarity (0.0 - 1.0)
            let score = jaro_winkler::normalized_similarity(query_lower.chars(), name.chars());

            // Threshold is expressed as a percentage
            (score * 100.0 >= self.min_score).then_some((row, score))
        });

        top_k(scored, limit)
            .into_iter()
            .map(|(row, score)| ScoredName::new(row, score))
            .collect()
    }

    fn name(&self) -> &str {
        "rapidfuzz"
    }
}
