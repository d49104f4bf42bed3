use crate::config::MAX_RESULTS;
use crate::error::{RecipeEngineError, Result};
use crate::features::DenseMatrix;
use crate::ranking::{top_k, RankingMode};

/// Cosine similarity; 0 when either vector has zero norm
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    similarity_with_norms(a, b, norm(a), norm(b))
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

fn similarity_with_norms(a: &[f64], b: &[f64], norm_a: f64, norm_b: f64) -> f64 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (norm_a * norm_b)
}

/// Dish row with its scores for one query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDish {
    pub row: usize,
    pub similarity: f64,
    pub weight: f64,
    pub weighted_score: f64,
}

/// Cosine ranking over the latent dish matrix
///
/// Row norms are computed once; `weights` must be index-aligned with the
/// latent rows.
#[derive(Debug, Clone)]
pub struct SimilarityRanker {
    latent: DenseMatrix,
    norms: Vec<f64>,
    weights: Vec<f64>,
}

impl SimilarityRanker {
    pub fn new(latent: DenseMatrix, weights: Vec<f64>) -> Result<Self> {
        if latent.rows() != weights.len() {
            return Err(RecipeEngineError::Other(format!(
                "latent matrix has {} rows but {} review weights were given",
                latent.rows(),
                weights.len()
            )));
        }
        let norms = latent.iter_rows().map(norm).collect();
        Ok(Self {
            latent,
            norms,
            weights,
        })
    }

    pub fn len(&self) -> usize {
        self.latent.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.latent.rows() == 0
    }

    pub fn latent(&self) -> &DenseMatrix {
        &self.latent
    }

    pub fn weight(&self, row: usize) -> f64 {
        self.weights[row]
    }

    /// Cosine similarity between two dish rows
    pub fn similarity(&self, a: usize, b: usize) -> f64 {
        similarity_with_norms(
            self.latent.row(a),
            self.latent.row(b),
            self.norms[a],
            self.norms[b],
        )
    }

    /// Up to `limit` (max 10) dishes most similar to `query_row`, excluding itself
    ///
    /// Scores are weighted before selection: the top `limit + 1` by the
    /// score in force are taken, the query is dropped, and the rest is
    /// truncated to `limit`. Equal scores keep row order.
    pub fn rank(&self, query_row: usize, limit: usize, mode: RankingMode) -> Result<Vec<ScoredDish>> {
        if query_row >= self.len() {
            return Err(RecipeEngineError::InvalidInput(format!(
                "query row {} out of range for {} dishes",
                query_row,
                self.len()
            )));
        }
        let limit = limit.min(MAX_RESULTS);

        let scored: Vec<ScoredDish> = (0..self.len())
            .map(|row| {
                let similarity = self.similarity(query_row, row);
                let weight = self.weights[row];
                let weighted_score = match mode {
                    RankingMode::Weighted => similarity * weight,
                    RankingMode::Raw => similarity,
                };
                ScoredDish {
                    row,
                    similarity,
                    weight,
                    weighted_score,
                }
            })
            .collect();

        let selected = top_k(scored.iter().map(|s| (s.row, s.weighted_score)), limit + 1);

        Ok(selected
            .into_iter()
            .filter(|(row, _)| *row != query_row)
            .take(limit)
            .map(|(row, _)| scored[row])
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranker(rows: &[[f64; 2]], weights: Vec<f64>) -> SimilarityRanker {
        let data = rows.iter().flat_map(|r| r.iter().copied()).collect();
        let latent = DenseMatrix::from_row_major(rows.len(), 2, data).unwrap();
        SimilarityRanker::new(latent, weights).unwrap()
    }

    #[test]
    fn test_cosine_basics() {
        let a = [1.0, 2.0, 3.0];
        let b = [-2.0, 0.5, 4.0];
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-12);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn test_zero_norm_is_zero_similarity() {
        let zero = [0.0, 0.0];
        assert_eq!(cosine_similarity(&zero, &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
        assert!(!cosine_similarity(&zero, &zero).is_nan());
    }

    #[test]
    fn test_rank_excludes_query() {
        let r = ranker(&[[1.0, 0.0], [0.9, 0.1], [0.0, 1.0], [0.5, 0.5]], vec![1.0; 4]);
        let ranked = r.rank(0, 10, RankingMode::Raw).unwrap();

        assert_eq!(ranked.len(), 3);
        assert!(ranked.iter().all(|s| s.row != 0));
        assert_eq!(ranked.iter().map(|s| s.row).collect::<Vec<_>>(), vec![1, 3, 2]);
    }

    #[test]
    fn test_weights_reorder_results() {
        let r = ranker(&[[1.0, 0.0], [0.9, 0.1], [0.7, 0.3]], vec![1.0, 0.25, 1.5]);

        let raw = r.rank(0, 10, RankingMode::Raw).unwrap();
        assert_eq!(raw[0].row, 1);

        let weighted = r.rank(0, 10, RankingMode::Weighted).unwrap();
        assert_eq!(weighted[0].row, 2);
        assert!((weighted[0].weighted_score - weighted[0].similarity * 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_rank_caps_at_ten() {
        let rows: Vec<[f64; 2]> = (0..30).map(|i| [1.0, i as f64 * 0.01]).collect();
        let r = ranker(&rows, vec![1.0; 30]);
        for query in [0, 15, 29] {
            let ranked = r.rank(query, 50, RankingMode::Weighted).unwrap();
            assert_eq!(ranked.len(), 10);
            assert!(ranked.iter().all(|s| s.row != query));
        }
    }

    #[test]
    fn test_zero_vector_query_keeps_index_order() {
        let r = ranker(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]], vec![1.0; 3]);
        let ranked = r.rank(0, 10, RankingMode::Weighted).unwrap();
        assert_eq!(ranked.iter().map(|s| s.row).collect::<Vec<_>>(), vec![1, 2]);
        assert!(ranked.iter().all(|s| s.similarity == 0.0));
    }

    #[test]
    fn test_misaligned_weights_rejected() {
        let latent = DenseMatrix::zeros(3, 2);
        assert!(SimilarityRanker::new(latent, vec![1.0; 2]).is_err());
    }

    #[test]
    fn test_out_of_range_query() {
        let r = ranker(&[[1.0, 0.0]], vec![1.0]);
        assert!(r.rank(1, 10, RankingMode::Raw).is_err());
        assert!(r.rank(0, 10, RankingMode::Raw).unwrap().is_empty());
    }
}
