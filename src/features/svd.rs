use nalgebra::{DMatrix, SVD};
use std::time::Instant;

use crate::catalog::FlavorVocabulary;
use crate::error::{RecipeEngineError, Result};
use crate::features::DenseMatrix;

/// Truncated SVD of the dish × flavor matrix
///
/// `latent` holds dish coordinates on the top-k flavor directions
/// (`U_k · Σ_k`, equivalently `X · V_k`). `loadings` holds the matching
/// right singular vectors, one row per latent dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct LatentFactorization {
    latent: DenseMatrix,
    singular_values: Vec<f64>,
    loadings: DenseMatrix,
}

impl LatentFactorization {
    /// Factorize `matrix`, keeping `min(k, rows, cols)` singular triples
    pub fn fit(matrix: &DenseMatrix, k: usize) -> Result<Self> {
        let start = Instant::now();
        let (rows, cols) = matrix.shape();
        let k_eff = k.min(rows).min(cols);

        if k_eff == 0 {
            tracing::warn!("Empty flavor matrix ({}x{}), latent space has no dimensions", rows, cols);
            return Ok(Self {
                latent: DenseMatrix::zeros(rows, 0),
                singular_values: Vec::new(),
                loadings: DenseMatrix::zeros(0, cols),
            });
        }

        let x = DMatrix::from_fn(rows, cols, |i, j| matrix.get(i, j));
        let svd = SVD::new(x, true, true);
        let u = svd
            .u
            .ok_or_else(|| RecipeEngineError::Other("SVD failed to compute U".to_string()))?;
        let v_t = svd
            .v_t
            .ok_or_else(|| RecipeEngineError::Other("SVD failed to compute V^T".to_string()))?;
        let sigma = svd.singular_values;

        // Descending singular values; stable so equal values keep their order
        let mut order: Vec<usize> = (0..sigma.len()).collect();
        order.sort_by(|&a, &b| sigma[b].total_cmp(&sigma[a]));

        let mut latent = DenseMatrix::zeros(rows, k_eff);
        let mut loadings = DenseMatrix::zeros(k_eff, cols);
        let mut singular_values = Vec::with_capacity(k_eff);

        for (dim, &src) in order.iter().take(k_eff).enumerate() {
            let sign = loading_sign(v_t.row(src).iter().copied());
            let s = sigma[src];
            singular_values.push(s);

            for (j, value) in loadings.row_mut(dim).iter_mut().enumerate() {
                *value = sign * v_t[(src, j)];
            }
            for i in 0..rows {
                latent.row_mut(i)[dim] = sign * u[(i, src)] * s;
            }
        }

        tracing::info!(
            "Factorized {}x{} flavor matrix to {} latent dimensions in {:.1}ms",
            rows,
            cols,
            k_eff,
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Self {
            latent,
            singular_values,
            loadings,
        })
    }

    /// Reassemble from persisted parts, checking that the shapes agree
    pub fn from_parts(
        latent: DenseMatrix,
        singular_values: Vec<f64>,
        loadings: DenseMatrix,
    ) -> Result<Self> {
        if latent.cols() != singular_values.len() || loadings.rows() != singular_values.len() {
            return Err(RecipeEngineError::Cache(format!(
                "inconsistent factorization shapes: latent {:?}, {} singular values, loadings {:?}",
                latent.shape(),
                singular_values.len(),
                loadings.shape()
            )));
        }
        Ok(Self {
            latent,
            singular_values,
            loadings,
        })
    }

    /// Dish × k matrix used for similarity
    pub fn latent(&self) -> &DenseMatrix {
        &self.latent
    }

    pub fn singular_values(&self) -> &[f64] {
        &self.singular_values
    }

    /// k × flavor right singular vectors
    pub fn loadings(&self) -> &DenseMatrix {
        &self.loadings
    }

    /// Number of latent dimensions actually kept
    pub fn dimensions(&self) -> usize {
        self.singular_values.len()
    }

    /// Flavors with the largest absolute loading on a latent dimension
    pub fn top_flavors(
        &self,
        dimension: usize,
        n: usize,
        vocabulary: &FlavorVocabulary,
    ) -> Vec<(String, f64)> {
        if dimension >= self.dimensions() {
            return Vec::new();
        }
        let mut weighted: Vec<(usize, f64)> =
            self.loadings.row(dimension).iter().copied().enumerate().collect();
        weighted.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        weighted
            .into_iter()
            .take(n)
            .filter_map(|(col, w)| vocabulary.tag(col).map(|t| (t.to_string(), w)))
            .collect()
    }
}

/// Sign that makes the largest-magnitude component positive
fn loading_sign(values: impl Iterator<Item = f64>) -> f64 {
    let mut best = 0.0f64;
    for v in values {
        if v.abs() > best.abs() {
            best = v;
        }
    }
    if best < 0.0 {
        -1.0
    } else {
        1.0
    }
}
