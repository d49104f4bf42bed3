use serde::{Deserialize, Serialize};

use crate::ranking::RankingMode;

/// One entry of a similarity ranking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedDish {
    /// 1-based position in the ranking
    pub rank: usize,

    pub id: i64,

    /// Display name
    pub name: String,

    /// Cosine similarity in latent space (-1.0 - 1.0)
    pub similarity: f64,

    /// Score the ranking is ordered by
    pub weighted_score: f64,

    /// Review weight applied to the similarity
    pub weight: f64,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub instructions: String,

    /// Average rating (1.0 - 5.0), absent without reviews
    #[serde(default)]
    pub rating: Option<f64>,

    #[serde(default)]
    pub review_count: u32,
}

/// Ranking for one query dish with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityResponse {
    /// Canonical name of the query dish
    pub query: String,

    pub query_id: i64,

    pub results: Vec<RankedDish>,

    pub mode: RankingMode,

    /// Ranking latency in milliseconds
    pub latency_ms: f64,
}

impl SimilarityResponse {
    /// Best match, if any
    pub fn top(&self) -> Option<&RankedDish> {
        self.results.first()
    }

    /// Result names in rank order
    pub fn names(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.name.as_str()).collect()
    }

    /// Get display string for logging
    pub fn display(&self) -> String {
        match self.top() {
            Some(top) => format!(
                "{} → {} result(s), top: {} ({:.3}) [{:?}]",
                self.query,
                self.results.len(),
                top.name,
                top.weighted_score,
                self.mode
            ),
            None => format!("{} → no results [{:?}]", self.query, self.mode),
        }
    }
}

/// Method that produced a name match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    /// TF-IDF cosine over dish names
    Tfidf,
    /// Jaro-Winkler fallback
    Fuzzy,
    /// Nothing cleared the thresholds
    None,
}

/// A known dish name matched against free text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NameMatch {
    pub name: String,
    pub id: i64,
    /// Similarity (0.0 - 1.0)
    pub score: f64,
}

/// Free-text lookup result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameMatchResponse {
    pub query: String,
    pub matches: Vec<NameMatch>,
    pub method: MatchMethod,
}

impl NameMatchResponse {
    pub fn best(&self) -> Option<&NameMatch> {
        self.matches.first()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}
