//! Review aggregation and popularity weights.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use crate::core::dish::deserialize_recipe_id;
use crate::corpus::DishCorpus;
use crate::error::{RecipeEngineError, Result};

/// Shape of the review input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewFormat {
    /// Detect from the first record
    #[default]
    Auto,
    /// One record per recipe with `AggregatedRating` and `ReviewCount`
    Summary,
    /// One record per review with `Rating`
    Raw,
}

/// Piecewise-linear mapping from average rating to a score multiplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightPolicy {
    /// Weight of recipes without a rating
    pub no_review_floor: f64,
    /// Multiplier on `ln(1 + review_count)` added to every weight
    pub count_bonus: f64,
}

impl Default for WeightPolicy {
    fn default() -> Self {
        Self {
            no_review_floor: 0.25,
            count_bonus: 0.0,
        }
    }
}

impl WeightPolicy {
    /// Weight for an average rating and review count
    ///
    /// `[1, 3)` maps to `[0.5, 1.0)`, `[3, 5]` to `[1.0, 1.5]`.
    pub fn weight(&self, rating: Option<f64>, review_count: u32) -> f64 {
        let base = match rating {
            None => self.no_review_floor,
            Some(r) => {
                let r = r.clamp(1.0, 5.0);
                if r < 3.0 {
                    0.5 + (r - 1.0) * 0.25
                } else {
                    1.0 + (r - 3.0) * 0.25
                }
            }
        };
        base + self.count_bonus * f64::from(review_count).ln_1p()
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..0.5).contains(&self.no_review_floor) {
            return Err(RecipeEngineError::Config(format!(
                "no_review_floor {} must be in 0.0..0.5 to stay below rated recipes",
                self.no_review_floor
            )));
        }
        if self.count_bonus < 0.0 {
            return Err(RecipeEngineError::Config(
                "count_bonus cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-recipe review summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewAggregate {
    pub average_rating: Option<f64>,
    pub review_count: u32,
    pub weight: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SummaryRecord {
    #[serde(deserialize_with = "deserialize_recipe_id")]
    recipe_id: i64,
    #[serde(default)]
    aggregated_rating: Option<f64>,
    #[serde(default)]
    review_count: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawReview {
    #[serde(deserialize_with = "deserialize_recipe_id")]
    recipe_id: i64,
    #[serde(default)]
    rating: Option<f64>,
}

/// Review aggregates keyed by RecipeId
#[derive(Debug, Clone, Default)]
pub struct ReviewTable {
    aggregates: HashMap<i64, ReviewAggregate>,
    policy: WeightPolicy,
}

impl ReviewTable {
    /// Load and aggregate a review file, keeping only recipes in `corpus`
    pub fn load(
        path: impl AsRef<Path>,
        format: ReviewFormat,
        corpus: &DishCorpus,
        policy: &WeightPolicy,
    ) -> Result<Self> {
        let path = path.as_ref();
        let body = std::fs::read_to_string(path).map_err(|e| RecipeEngineError::io(path, e))?;
        let value: Value = serde_json::from_str(&body)?;
        let table = Self::from_value(value, format, corpus, policy)?;
        tracing::info!(
            "Aggregated reviews from {}: {} of {} dishes rated",
            path.display(),
            table.rated_count(),
            corpus.len()
        );
        Ok(table)
    }

    /// Aggregate already-parsed JSON
    pub fn from_value(
        value: Value,
        format: ReviewFormat,
        corpus: &DishCorpus,
        policy: &WeightPolicy,
    ) -> Result<Self> {
        let records = match value {
            Value::Array(items) => items,
            Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
            _ => {
                return Err(RecipeEngineError::Corpus(
                    "review data must be a JSON array or object of records".to_string(),
                ))
            }
        };

        let format = match format {
            ReviewFormat::Auto => detect_format(&records),
            explicit => explicit,
        };

        let stats: HashMap<i64, (Option<f64>, u32)> = match format {
            ReviewFormat::Raw => aggregate_raw(records)?,
            _ => summarize(records)?,
        };

        let aggregates = corpus
            .ids()
            .into_iter()
            .map(|id| {
                let (average_rating, review_count) = stats.get(&id).copied().unwrap_or((None, 0));
                let aggregate = ReviewAggregate {
                    average_rating,
                    review_count,
                    weight: policy.weight(average_rating, review_count),
                };
                (id, aggregate)
            })
            .collect();

        Ok(Self {
            aggregates,
            policy: policy.clone(),
        })
    }

    /// Table where every dish is unreviewed
    pub fn empty(policy: &WeightPolicy) -> Self {
        Self {
            aggregates: HashMap::new(),
            policy: policy.clone(),
        }
    }

    pub fn get(&self, recipe_id: i64) -> Option<&ReviewAggregate> {
        self.aggregates.get(&recipe_id)
    }

    /// Weight of a recipe; unknown ids get the no-review floor
    pub fn weight(&self, recipe_id: i64) -> f64 {
        self.get(recipe_id)
            .map(|a| a.weight)
            .unwrap_or_else(|| self.policy.weight(None, 0))
    }

    /// Weights index-aligned with the corpus rows
    pub fn aligned_weights(&self, corpus: &DishCorpus) -> Vec<f64> {
        corpus.dishes().iter().map(|d| self.weight(d.id)).collect()
    }

    /// Recipes with an average rating
    pub fn rated_count(&self) -> usize {
        self.aggregates
            .values()
            .filter(|a| a.average_rating.is_some())
            .count()
    }

    pub fn len(&self) -> usize {
        self.aggregates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aggregates.is_empty()
    }
}

fn detect_format(records: &[Value]) -> ReviewFormat {
    match records.first() {
        Some(Value::Object(first)) if first.contains_key("Rating") => ReviewFormat::Raw,
        _ => ReviewFormat::Summary,
    }
}

/// Summary records: a null `ReviewCount` means no reviews at all
fn summarize(records: Vec<Value>) -> Result<HashMap<i64, (Option<f64>, u32)>> {
    let mut stats = HashMap::new();
    for record in records {
        let summary: SummaryRecord = serde_json::from_value(record)?;
        let entry = match summary.review_count {
            None => (None, 0),
            Some(count) => (summary.aggregated_rating, count.max(0.0) as u32),
        };
        stats.insert(summary.recipe_id, entry);
    }
    Ok(stats)
}

/// Raw reviews: mean and count per recipe; a rating of 0 means "not rated"
fn aggregate_raw(records: Vec<Value>) -> Result<HashMap<i64, (Option<f64>, u32)>> {
    let mut sums: HashMap<i64, (f64, u32)> = HashMap::new();
    for record in records {
        let review: RawReview = serde_json::from_value(record)?;
        let Some(rating) = review.rating.filter(|r| *r != 0.0) else {
            continue;
        };
        let entry = sums.entry(review.recipe_id).or_insert((0.0, 0));
        entry.0 += rating;
        entry.1 += 1;
    }
    Ok(sums
        .into_iter()
        .map(|(id, (sum, count))| (id, (Some(sum / f64::from(count)), count)))
        .collect())
}
