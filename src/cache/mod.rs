pub mod sqlite;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::catalog::FlavorCatalog;
use crate::corpus::DishCorpus;
use crate::error::Result;
use crate::features::{FlavorMatrix, LatentFactorization};

pub use sqlite::SqliteArtifactCache;

const UNIT_SEPARATOR: &[u8] = &[0x1f];
const RECORD_SEPARATOR: &[u8] = &[0x1e];

/// Trait for derived-matrix cache implementations
#[async_trait]
pub trait ArtifactCache: Send + Sync {
    /// Get cached artifacts for a corpus version and k
    async fn get(&self, key: &ArtifactKey) -> Result<Option<CachedArtifacts>>;

    /// Save artifacts, replacing any previous entry for the key
    async fn save(
        &self,
        key: &ArtifactKey,
        matrix: &FlavorMatrix,
        factorization: &LatentFactorization,
    ) -> Result<()>;

    /// Increment cache hit counter
    async fn increment_hit(&self, key: &ArtifactKey) -> Result<()>;

    /// Get cache statistics
    async fn stats(&self) -> Result<CacheStats>;

    /// Clear expired entries (older than `max_age_days`)
    async fn cleanup(&self, max_age_days: i64) -> Result<u64>;
}

/// Identifies one build: input fingerprint plus latent dimension count
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub fingerprint: String,
    pub latent_dims: usize,
}

impl ArtifactKey {
    pub fn new(fingerprint: impl Into<String>, latent_dims: usize) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            latent_dims,
        }
    }

    /// Key for the given inputs
    pub fn for_inputs(catalog: &FlavorCatalog, corpus: &DishCorpus, latent_dims: usize) -> Self {
        Self::new(corpus_fingerprint(catalog, corpus), latent_dims)
    }

    /// Primary key string
    pub fn as_key(&self) -> String {
        format!("{}:k{}", self.fingerprint, self.latent_dims)
    }
}

/// Cached build with metadata
#[derive(Debug, Clone)]
pub struct CachedArtifacts {
    pub key: ArtifactKey,
    pub matrix: FlavorMatrix,
    pub factorization: LatentFactorization,
    pub hit_count: i32,
    pub cached_at: chrono::DateTime<chrono::Utc>,
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub total_entries: u64,
    pub total_hits: u64,
    pub avg_hit_count: f64,
    pub oldest_entry: Option<chrono::DateTime<chrono::Utc>>,
    pub newest_entry: Option<chrono::DateTime<chrono::Utc>>,
}

/// SHA-256 over everything the matrices are derived from
///
/// Covers the vocabulary, every ingredient's tag counts and every dish's
/// id, name and ingredients, so any change forces a rebuild.
pub fn corpus_fingerprint(catalog: &FlavorCatalog, corpus: &DishCorpus) -> String {
    let mut hasher = Sha256::new();

    for tag in catalog.vocabulary().tags() {
        hasher.update(tag.as_bytes());
        hasher.update(UNIT_SEPARATOR);
    }
    hasher.update(RECORD_SEPARATOR);

    let mut ingredient_names: Vec<&str> = corpus
        .dishes()
        .iter()
        .flat_map(|d| d.ingredients.iter().map(String::as_str))
        .filter(|name| catalog.get(name).is_some())
        .collect();
    ingredient_names.sort_unstable();
    ingredient_names.dedup();
    for name in ingredient_names {
        if let Some(descriptor) = catalog.get(name) {
            hasher.update(name.as_bytes());
            for (tag, count) in &descriptor.tag_counts {
                hasher.update(tag.as_bytes());
                hasher.update(count.to_le_bytes());
            }
            hasher.update(UNIT_SEPARATOR);
        }
    }
    hasher.update(RECORD_SEPARATOR);

    for dish in corpus.dishes() {
        hasher.update(dish.id.to_le_bytes());
        hasher.update(dish.name.as_bytes());
        for ingredient in &dish.ingredients {
            hasher.update(UNIT_SEPARATOR);
            hasher.update(ingredient.as_bytes());
        }
        hasher.update(RECORD_SEPARATOR);
    }

    format!("{:x}", hasher.finalize())
}
