use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::cache::{ArtifactCache, ArtifactKey, CacheStats, SqliteArtifactCache};
use crate::catalog::FlavorCatalog;
use crate::config::EngineConfig;
use crate::core::{
    DishListing, MatchMethod, NameMatch, NameMatchResponse, RankedDish, SimilarityResponse,
};
use crate::corpus::{canonical_name, DishCorpus};
use crate::error::{RecipeEngineError, Result};
use crate::features::{FlavorMatrix, LatentFactorization, MatrixStats};
use crate::ranking::{
    FuzzyMatcher, NameMatcher, RankingMode, ScoredName, SimilarityRanker, TfidfMatcher,
};
use crate::reviews::ReviewTable;

/// Everything derived from one version of the inputs
///
/// Built once and only read afterwards; a reload builds a fresh context.
pub struct CorpusContext {
    catalog: FlavorCatalog,
    corpus: DishCorpus,
    matrix: FlavorMatrix,
    factorization: LatentFactorization,
    reviews: ReviewTable,
    ranker: SimilarityRanker,
    tfidf: TfidfMatcher,
    fuzzy: FuzzyMatcher,
    key: ArtifactKey,
    from_cache: bool,
}

impl CorpusContext {
    /// Read the configured inputs and build (or fetch from `cache`) the derived matrices
    ///
    /// File parsing and the SVD run on the blocking pool.
    pub async fn load(config: &EngineConfig, cache: Option<&dyn ArtifactCache>) -> Result<Self> {
        let start = Instant::now();

        let owned = config.clone();
        let inputs = run_blocking(move || CorpusInputs::read(&owned)).await?;

        let cached = match cache {
            Some(cache) => fetch_cached(cache, &inputs.key, inputs.corpus.len()).await,
            None => None,
        };

        let owned = config.clone();
        let context = run_blocking(move || {
            let from_cache = cached.is_some();
            let (matrix, factorization) = match cached {
                Some(parts) => parts,
                None => inputs.build()?,
            };
            Self::assemble(inputs, matrix, factorization, &owned, from_cache)
        })
        .await?;

        if let Some(cache) = cache.filter(|_| !context.from_cache) {
            if let Err(e) = cache
                .save(&context.key, &context.matrix, &context.factorization)
                .await
            {
                tracing::warn!("Failed to save artifacts to cache: {}", e);
            }
        }

        tracing::info!(
            "Corpus ready: {} dishes, {} flavors, {} latent dims ({}) in {:.1}ms",
            context.corpus.len(),
            context.catalog.vocabulary().len(),
            context.factorization.dimensions(),
            if context.from_cache { "cached" } else { "built" },
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(context)
    }

    /// Build directly from in-memory inputs, bypassing files and cache
    pub fn from_inputs(
        catalog: FlavorCatalog,
        corpus: DishCorpus,
        reviews: ReviewTable,
        config: &EngineConfig,
    ) -> Result<Self> {
        let inputs = CorpusInputs::new(catalog, corpus, reviews, config);
        let (matrix, factorization) = inputs.build()?;
        Self::assemble(inputs, matrix, factorization, config, false)
    }

    fn assemble(
        inputs: CorpusInputs,
        matrix: FlavorMatrix,
        factorization: LatentFactorization,
        config: &EngineConfig,
        from_cache: bool,
    ) -> Result<Self> {
        let CorpusInputs {
            catalog,
            corpus,
            reviews,
            key,
        } = inputs;

        let weights = reviews.aligned_weights(&corpus);
        let ranker = SimilarityRanker::new(factorization.latent().clone(), weights)?;

        let names = corpus.names();
        let tfidf = TfidfMatcher::fit(names.as_slice(), config.matcher.threshold);
        let fuzzy = FuzzyMatcher::new(names.as_slice(), config.matcher.fuzzy_min_score);

        Ok(Self {
            catalog,
            corpus,
            matrix,
            factorization,
            reviews,
            ranker,
            tfidf,
            fuzzy,
            key,
            from_cache,
        })
    }

    pub fn catalog(&self) -> &FlavorCatalog {
        &self.catalog
    }

    pub fn corpus(&self) -> &DishCorpus {
        &self.corpus
    }

    pub fn matrix(&self) -> &FlavorMatrix {
        &self.matrix
    }

    pub fn factorization(&self) -> &LatentFactorization {
        &self.factorization
    }

    pub fn reviews(&self) -> &ReviewTable {
        &self.reviews
    }

    pub fn ranker(&self) -> &SimilarityRanker {
        &self.ranker
    }

    pub fn key(&self) -> &ArtifactKey {
        &self.key
    }

    /// Whether the matrices came from the artifact cache
    pub fn from_cache(&self) -> bool {
        self.from_cache
    }

    /// Row of a dish, or `DishNotFound`
    pub fn require(&self, dish: &str) -> Result<usize> {
        self.corpus
            .position(dish)
            .ok_or_else(|| RecipeEngineError::DishNotFound(canonical_name(dish)))
    }

    fn ranked_dish(&self, rank: usize, row: usize, similarity: f64, weighted_score: f64) -> Option<RankedDish> {
        let dish = self.corpus.get(row)?;
        let review = self.reviews.get(dish.id);
        Some(RankedDish {
            rank,
            id: dish.id,
            name: dish.display_name().to_string(),
            similarity,
            weighted_score,
            weight: self.ranker.weight(row),
            author: dish.author.clone(),
            description: dish.description.clone(),
            instructions: dish.instructions.clone(),
            rating: review.and_then(|r| r.average_rating),
            review_count: review.map(|r| r.review_count).unwrap_or(0),
        })
    }

    fn name_matches(&self, scored: Vec<ScoredName>) -> Vec<NameMatch> {
        scored
            .into_iter()
            .filter_map(|s| {
                self.corpus.get(s.row).map(|dish| NameMatch {
                    name: dish.display_name().to_string(),
                    id: dish.id,
                    score: s.score,
                })
            })
            .collect()
    }
}

/// Parsed input files plus the cache key they hash to
struct CorpusInputs {
    catalog: FlavorCatalog,
    corpus: DishCorpus,
    reviews: ReviewTable,
    key: ArtifactKey,
}

impl CorpusInputs {
    fn read(config: &EngineConfig) -> Result<Self> {
        let data = &config.data;
        let catalog = FlavorCatalog::load_dir(&data.flavors_dir)?;
        let corpus = DishCorpus::load(&data.recipes_path, data.allow_duplicate_names)?;
        let reviews_path = data.reviews_path.as_deref().unwrap_or(&data.recipes_path);
        let reviews = ReviewTable::load(reviews_path, data.reviews_format, &corpus, &config.weights)?;
        Ok(Self::new(catalog, corpus, reviews, config))
    }

    fn new(catalog: FlavorCatalog, corpus: DishCorpus, reviews: ReviewTable, config: &EngineConfig) -> Self {
        let key = ArtifactKey::for_inputs(&catalog, &corpus, config.factorization.latent_dims);
        Self {
            catalog,
            corpus,
            reviews,
            key,
        }
    }

    fn build(&self) -> Result<(FlavorMatrix, LatentFactorization)> {
        let matrix = FlavorMatrix::build(&self.catalog, &self.corpus);
        let factorization = LatentFactorization::fit(matrix.matrix(), self.key.latent_dims)?;
        Ok((matrix, factorization))
    }
}

/// Run CPU-bound or file work off the async workers
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RecipeEngineError::Other(format!("Corpus build task failed: {}", e)))?
}

/// Cached matrices, if present and consistent with the corpus
///
/// Cache failures are logged and treated as a miss.
async fn fetch_cached(
    cache: &dyn ArtifactCache,
    key: &ArtifactKey,
    dishes: usize,
) -> Option<(FlavorMatrix, LatentFactorization)> {
    match cache.get(key).await {
        Ok(Some(cached)) if cached.factorization.latent().rows() == dishes => {
            tracing::info!(
                "Artifact cache hit for {} (cached {}, {} previous hits)",
                key.as_key(),
                cached.cached_at.format("%Y-%m-%d %H:%M:%S"),
                cached.hit_count
            );
            if let Err(e) = cache.increment_hit(key).await {
                tracing::warn!("Failed to record cache hit: {}", e);
            }
            Some((cached.matrix, cached.factorization))
        }
        Ok(Some(_)) => {
            tracing::warn!("Cached artifacts for {} do not match the corpus, rebuilding", key.as_key());
            None
        }
        Ok(None) => {
            tracing::debug!("Artifact cache miss for {}", key.as_key());
            None
        }
        Err(e) => {
            tracing::warn!("Artifact cache lookup failed, rebuilding: {}", e);
            None
        }
    }
}

/// Similarity query parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimilarQuery {
    pub dish: String,
    /// Defaults to `ranking.max_results`
    #[serde(default)]
    pub max_results: Option<usize>,
    /// Defaults to `ranking.mode`
    #[serde(default)]
    pub mode: Option<RankingMode>,
}

impl SimilarQuery {
    pub fn new(dish: impl Into<String>) -> Self {
        Self {
            dish: dish.into(),
            ..Self::default()
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn with_mode(mut self, mode: RankingMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// One latent dimension with its strongest flavors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatentDimension {
    pub dimension: usize,
    pub singular_value: f64,
    pub top_flavors: Vec<(String, f64)>,
}

/// Main recipe recommendation engine
pub struct RecipeEngine {
    config: EngineConfig,
    cache: Option<Arc<dyn ArtifactCache>>,
    context: RwLock<Arc<CorpusContext>>,
    selection: RwLock<Option<String>>,
}

impl RecipeEngine {
    /// Validate `config`, open the artifact cache and build the corpus context
    pub async fn open(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let cache: Option<Arc<dyn ArtifactCache>> = if config.cache.enabled {
            Some(Arc::new(SqliteArtifactCache::new(&config.cache.db_path).await?))
        } else {
            tracing::info!("Artifact cache disabled");
            None
        };

        Self::open_with_cache(config, cache).await
    }

    /// Like [`RecipeEngine::open`] with a caller-provided cache
    pub async fn open_with_cache(
        config: EngineConfig,
        cache: Option<Arc<dyn ArtifactCache>>,
    ) -> Result<Self> {
        config.validate()?;
        let context = CorpusContext::load(&config, cache.as_deref()).await?;
        Ok(Self {
            config,
            cache,
            context: RwLock::new(Arc::new(context)),
            selection: RwLock::new(None),
        })
    }

    /// Engine over an already-built context, without a cache
    pub fn from_context(config: EngineConfig, context: CorpusContext) -> Self {
        Self {
            config,
            cache: None,
            context: RwLock::new(Arc::new(context)),
            selection: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current context; stays valid across a concurrent reload
    pub async fn context(&self) -> Arc<CorpusContext> {
        self.context.read().await.clone()
    }

    /// All canonical dish names in corpus order
    pub async fn dish_names(&self) -> Vec<String> {
        let context = self.context().await;
        context.corpus.names().into_iter().map(str::to_string).collect()
    }

    /// Dishes whose name contains `fragment`, with their review summary
    pub async fn search_names(&self, fragment: &str) -> Vec<DishListing> {
        let context = self.context().await;
        context
            .corpus
            .search(fragment)
            .into_iter()
            .map(|dish| {
                let review = context.reviews.get(dish.id);
                DishListing {
                    dish: dish.clone(),
                    rating: review.and_then(|r| r.average_rating),
                    review_count: review.map(|r| r.review_count).unwrap_or(0),
                }
            })
            .collect()
    }

    /// Known dish names closest to free text
    ///
    /// TF-IDF first; when it finds nothing and the fallback is enabled,
    /// Jaro-Winkler over the same names.
    pub async fn match_names(&self, query: &str) -> NameMatchResponse {
        let context = self.context().await;
        let limit = self.config.matcher.max_results;

        let mut method = MatchMethod::Tfidf;
        let mut scored = context.tfidf.match_names(query, limit);

        if scored.is_empty() && self.config.matcher.fuzzy_fallback {
            tracing::debug!(
                "{} found nothing for '{}', trying {}",
                context.tfidf.name(),
                query,
                context.fuzzy.name()
            );
            method = MatchMethod::Fuzzy;
            scored = context.fuzzy.match_names(query, limit);
        }

        if scored.is_empty() {
            method = MatchMethod::None;
        }

        let matches = context.name_matches(scored);
        tracing::debug!("Name match '{}' → {} match(es) [{:?}]", query, matches.len(), method);

        NameMatchResponse {
            query: query.to_string(),
            matches,
            method,
        }
    }

    /// Up to `max_results` (at most 10) dishes most similar to the query dish
    pub async fn similar(&self, query: SimilarQuery) -> Result<SimilarityResponse> {
        let start = Instant::now();
        let context = self.context().await;

        let max_results = query.max_results.unwrap_or(self.config.ranking.max_results);
        if max_results == 0 {
            return Err(RecipeEngineError::InvalidInput(
                "max_results must be at least 1".to_string(),
            ));
        }
        let mode = query.mode.unwrap_or(self.config.ranking.mode);

        let row = context.require(&query.dish)?;
        let scored = context.ranker.rank(row, max_results, mode)?;

        let results = scored
            .iter()
            .enumerate()
            .filter_map(|(i, s)| context.ranked_dish(i + 1, s.row, s.similarity, s.weighted_score))
            .collect();

        let query_dish = context
            .corpus
            .get(row)
            .ok_or_else(|| RecipeEngineError::DishNotFound(canonical_name(&query.dish)))?;

        let response = SimilarityResponse {
            query: query_dish.name.clone(),
            query_id: query_dish.id,
            results,
            mode,
            latency_ms: start.elapsed().as_secs_f64() * 1000.0,
        };

        tracing::debug!("{} ({:.2}ms)", response.display(), response.latency_ms);
        Ok(response)
    }

    /// Remember a dish for [`RecipeEngine::similar_to_selection`]; last write wins
    pub async fn submit_selection(&self, dish: &str) -> Result<String> {
        let context = self.context().await;
        let row = context.require(dish)?;
        let name = context
            .corpus
            .get(row)
            .map(|d| d.name.clone())
            .ok_or_else(|| RecipeEngineError::DishNotFound(canonical_name(dish)))?;

        *self.selection.write().await = Some(name.clone());
        tracing::debug!("Selection set to '{}'", name);
        Ok(name)
    }

    /// Currently selected dish, if any
    pub async fn selection(&self) -> Option<String> {
        self.selection.read().await.clone()
    }

    /// Rank against the submitted selection
    pub async fn similar_to_selection(&self) -> Result<SimilarityResponse> {
        let dish = self
            .selection()
            .await
            .ok_or(RecipeEngineError::NoSelection)?;
        self.similar(SimilarQuery::new(dish)).await
    }

    /// Non-zero flavor counts of a dish, highest first
    pub async fn flavor_profile(&self, dish: &str) -> Result<Vec<(String, f64)>> {
        let context = self.context().await;
        let row = context.require(dish)?;
        Ok(context.matrix.flavor_profile(row, context.catalog.vocabulary()))
    }

    /// Singular value and `n` strongest flavors of every latent dimension
    pub async fn latent_diagnostics(&self, n: usize) -> Vec<LatentDimension> {
        let context = self.context().await;
        let factorization = &context.factorization;
        let vocabulary = context.catalog.vocabulary();

        factorization
            .singular_values()
            .iter()
            .enumerate()
            .map(|(dimension, &singular_value)| LatentDimension {
                dimension,
                singular_value,
                top_flavors: factorization.top_flavors(dimension, n, vocabulary),
            })
            .collect()
    }

    pub async fn matrix_stats(&self) -> MatrixStats {
        self.context().await.matrix.stats().clone()
    }

    /// Rebuild from the inputs and swap the context in atomically
    ///
    /// On failure the current context stays in place.
    pub async fn reload(&self) -> Result<()> {
        let context = CorpusContext::load(&self.config, self.cache.as_deref()).await?;
        let dishes = context.corpus.len();
        *self.context.write().await = Arc::new(context);
        tracing::info!("Reloaded corpus ({} dishes)", dishes);
        Ok(())
    }

    /// Artifact cache statistics; `None` when the cache is disabled
    pub async fn cache_stats(&self) -> Result<Option<CacheStats>> {
        match &self.cache {
            Some(cache) => cache.stats().await.map(Some),
            None => Ok(None),
        }
    }

    /// Drop cached builds older than `max_age_days`
    pub async fn cleanup_cache(&self, max_age_days: i64) -> Result<u64> {
        match &self.cache {
            Some(cache) => cache.cleanup(max_age_days).await,
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::IngredientDescriptor;
    use crate::core::DishRecord;
    use crate::reviews::WeightPolicy;

    fn descriptor(file: &str, profile: &str) -> IngredientDescriptor {
        let body = format!(r#"{{"molecules": [{{"flavor_profile": "{}"}}]}}"#, profile);
        IngredientDescriptor::parse(file, &body).unwrap()
    }

    fn engine() -> RecipeEngine {
        let catalog = FlavorCatalog::from_descriptors(vec![
            descriptor("0 Pork.json", "meaty@savory"),
            descriptor("1 Chicken.json", "meaty@savory@mild"),
            descriptor("2 Apple.json", "fruity@sweet"),
        ]);
        let corpus = DishCorpus::from_records(
            vec![
                DishRecord::new(1, "Pulled Pork", vec!["pork".into()]),
                DishRecord::new(2, "Pulled Chicken", vec!["chicken".into()]),
                DishRecord::new(3, "Apple Pie", vec!["apple".into()]),
            ],
            false,
        )
        .unwrap();
        let config = EngineConfig::default();
        let reviews = ReviewTable::empty(&WeightPolicy::default());
        let context = CorpusContext::from_inputs(catalog, corpus, reviews, &config).unwrap();
        RecipeEngine::from_context(config, context)
    }

    #[tokio::test]
    async fn test_similar_ranks_related_dish_first() {
        let engine = engine();
        let response = engine.similar(SimilarQuery::new("Pulled Pork")).await.unwrap();

        assert_eq!(response.query, "pulled pork");
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].name, "Pulled Chicken");
        assert_eq!(response.results[0].rank, 1);
        assert_eq!(response.results[0].weight, 0.25);
    }

    #[tokio::test]
    async fn test_unknown_dish() {
        let engine = engine();
        let err = engine.similar(SimilarQuery::new("lasagna")).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(engine.flavor_profile("lasagna").await.is_err());
    }

    #[tokio::test]
    async fn test_zero_max_results_rejected() {
        let engine = engine();
        let err = engine
            .similar(SimilarQuery::new("pulled pork").with_max_results(0))
            .await
            .unwrap_err();
        assert!(matches!(err, RecipeEngineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_selection_flow() {
        let engine = engine();
        assert!(matches!(
            engine.similar_to_selection().await,
            Err(RecipeEngineError::NoSelection)
        ));

        assert_eq!(engine.submit_selection("  PULLED chicken ").await.unwrap(), "pulled chicken");
        let response = engine.similar_to_selection().await.unwrap();
        assert_eq!(response.query, "pulled chicken");
        assert_eq!(response.results[0].name, "Pulled Pork");

        assert!(engine.submit_selection("lasagna").await.is_err());
        assert_eq!(engine.selection().await.as_deref(), Some("pulled chicken"));
    }

    #[tokio::test]
    async fn test_match_names_with_fallback() {
        let engine = engine();

        let exact = engine.match_names("pulled pork").await;
        assert_eq!(exact.method, MatchMethod::Tfidf);
        assert_eq!(exact.best().unwrap().name, "Pulled Pork");

        let typo = engine.match_names("aple pei").await;
        assert_eq!(typo.method, MatchMethod::Fuzzy);
        assert_eq!(typo.best().unwrap().name, "Apple Pie");

        let nothing = engine.match_names("zzzzzzzz").await;
        assert_eq!(nothing.method, MatchMethod::None);
        assert!(nothing.is_empty());
    }

    #[tokio::test]
    async fn test_diagnostics() {
        let engine = engine();
        let profile = engine.flavor_profile("pulled chicken").await.unwrap();
        assert_eq!(profile.len(), 3);

        let dims = engine.latent_diagnostics(2).await;
        assert!(!dims.is_empty());
        assert!(dims.iter().all(|d| d.top_flavors.len() <= 2));

        let stats = engine.matrix_stats().await;
        assert_eq!(stats.dishes, 3);
        assert!(engine.cache_stats().await.unwrap().is_none());
        assert_eq!(engine.cleanup_cache(0).await.unwrap(), 0);
    }
}
