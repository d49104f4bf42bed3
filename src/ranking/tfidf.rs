//! TF-IDF name matcher.
//!
//! Fitted once over all dish names. Tokenization and weighting follow the
//! common vectorizer defaults: lowercase, tokens of two or more word
//! characters, smoothed idf `ln((1 + n) / (1 + df)) + 1`, l2-normalized rows.

use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

use crate::ranking::{top_k, NameMatcher, ScoredName};

/// Sparse l2-normalized vector, sorted by term index
type SparseVector = Vec<(usize, f64)>;

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b\w\w+\b").expect("valid token pattern"))
}

/// NFC-normalize, lowercase and split into word tokens
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = text.nfc().collect::<String>().to_lowercase();
    token_pattern()
        .find_iter(&normalized)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// TF-IDF vector space over dish names
#[derive(Debug, Clone)]
pub struct TfidfMatcher {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    documents: Vec<SparseVector>,
    threshold: f64,
}

impl TfidfMatcher {
    /// Fit the vocabulary and idf weights over `names`
    pub fn fit<S: AsRef<str>>(names: &[S], threshold: f64) -> Self {
        let tokenized: Vec<Vec<String>> = names.iter().map(|n| tokenize(n.as_ref())).collect();

        let mut doc_freq: BTreeMap<&str, usize> = BTreeMap::new();
        for tokens in &tokenized {
            let mut unique: Vec<&str> = tokens.iter().map(String::as_str).collect();
            unique.sort_unstable();
            unique.dedup();
            for term in unique {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        // BTreeMap order gives sorted, reproducible term indices
        let n = names.len() as f64;
        let mut vocabulary = HashMap::with_capacity(doc_freq.len());
        let mut idf = Vec::with_capacity(doc_freq.len());
        for (index, (term, df)) in doc_freq.iter().enumerate() {
            vocabulary.insert(term.to_string(), index);
            idf.push(((1.0 + n) / (1.0 + *df as f64)).ln() + 1.0);
        }

        let mut matcher = Self {
            vocabulary,
            idf,
            documents: Vec::new(),
            threshold,
        };
        let documents = tokenized.iter().map(|t| matcher.vectorize(t)).collect();
        matcher.documents = documents;

        tracing::debug!(
            "Fitted TF-IDF over {} names ({} terms)",
            matcher.documents.len(),
            matcher.vocabulary.len()
        );
        matcher
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    /// Project text into the fitted space; unknown terms are ignored
    pub fn transform(&self, text: &str) -> SparseVector {
        self.vectorize(&tokenize(text))
    }

    /// Cosine similarity of `query` against every fitted name
    pub fn scores(&self, query: &str) -> Vec<f64> {
        let query_vector: HashMap<usize, f64> = self.transform(query).into_iter().collect();
        self.documents
            .iter()
            .map(|doc| {
                doc.iter()
                    .filter_map(|(term, w)| query_vector.get(term).map(|q| q * w))
                    .sum()
            })
            .collect()
    }

    fn vectorize(&self, tokens: &[String]) -> SparseVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for token in tokens {
            if let Some(&index) = self.vocabulary.get(token) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let mut vector: SparseVector = counts
            .into_iter()
            .map(|(index, tf)| (index, tf * self.idf[index]))
            .collect();

        let norm = vector.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in vector.iter_mut() {
                *w /= norm;
            }
        }
        vector
    }
}

impl NameMatcher for TfidfMatcher {
    fn match_names(&self, query: &str, limit: usize) -> Vec<ScoredName> {
        let candidates = self
            .scores(query)
            .into_iter()
            .enumerate()
            .filter(|(_, score)| *score > 0.0 && *score >= self.threshold);

        top_k(candidates, limit)
            .into_iter()
            .map(|(row, score)| ScoredName::new(row, score))
            .collect()
    }

    fn name(&self) -> &str {
        "tfidf"
    }
}
