pub mod fallback;
pub mod similarity;
pub mod tfidf;

use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

pub use fallback::FuzzyMatcher;
pub use similarity::{cosine_similarity, ScoredDish, SimilarityRanker};
pub use tfidf::TfidfMatcher;

/// Trait for free-text → dish name matching implementations
pub trait NameMatcher: Send + Sync {
    /// Best matching names, highest score first, at most `limit`
    fn match_names(&self, query: &str, limit: usize) -> Vec<ScoredName>;

    /// Get matcher name for logging
    fn name(&self) -> &str;
}

/// Dish row with its name-match score (0.0 - 1.0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredName {
    pub row: usize,
    pub score: f64,
}

impl ScoredName {
    pub fn new(row: usize, score: f64) -> Self {
        Self { row, score }
    }
}

/// Score the similarity ranking is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingMode {
    /// Cosine similarity × review weight
    #[default]
    Weighted,
    /// Cosine similarity only
    Raw,
}

/// Heap entry: higher score wins, then lower index
#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    index: usize,
    score: f64,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.index.cmp(&self.index))
    }
}

/// Bounded top-k selection, descending by score
///
/// Equal scores keep ascending index order, the same order a stable sort
/// would give. Runs in O(n log k).
pub fn top_k(scores: impl IntoIterator<Item = (usize, f64)>, k: usize) -> Vec<(usize, f64)> {
    if k == 0 {
        return Vec::new();
    }
    let mut heap: BinaryHeap<Reverse<HeapEntry>> = BinaryHeap::with_capacity(k + 1);
    for (index, score) in scores {
        heap.push(Reverse(HeapEntry { index, score }));
        if heap.len() > k {
            heap.pop();
        }
    }
    heap.into_sorted_vec()
        .into_iter()
        .map(|Reverse(e)| (e.index, e.score))
        .collect()
}
