//! Engine configuration.
//!
//! Loaded from a YAML file where present, then overridden by environment
//! variables. Every field has a default so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RecipeEngineError, Result};
use crate::ranking::RankingMode;
use crate::reviews::{ReviewFormat, WeightPolicy};

/// Hard upper bound on ranked results per query
pub const MAX_RESULTS: usize = 10;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub data: DataConfig,
    pub factorization: FactorizationConfig,
    pub ranking: RankingConfig,
    pub matcher: MatcherConfig,
    pub weights: WeightPolicy,
    pub cache: CacheConfig,
    pub server: ServerConfig,
}

/// Input corpus locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory of `"<index> <Ingredient>.json"` descriptor files
    pub flavors_dir: PathBuf,
    /// Recipe corpus JSON array
    pub recipes_path: PathBuf,
    /// Review data; the recipe corpus itself when absent
    pub reviews_path: Option<PathBuf>,
    pub reviews_format: ReviewFormat,
    /// Keep the first of several recipes sharing a name instead of failing
    pub allow_duplicate_names: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            flavors_dir: PathBuf::from("data/flavors"),
            recipes_path: PathBuf::from("data/reduced-recipe.json"),
            reviews_path: None,
            reviews_format: ReviewFormat::Auto,
            allow_duplicate_names: false,
        }
    }
}

impl DataConfig {
    /// Point every input at a single data directory using the default file names
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            flavors_dir: dir.join("flavors"),
            recipes_path: dir.join("reduced-recipe.json"),
            reviews_path: Some(dir.join("reviews.json")).filter(|p| p.exists()),
            ..Self::default()
        }
    }

    /// Re-point the input files at `dir`, keeping the parsing options
    pub fn with_dir(&self, dir: impl AsRef<Path>) -> Self {
        Self {
            reviews_format: self.reviews_format,
            allow_duplicate_names: self.allow_duplicate_names,
            ..Self::from_dir(dir)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorizationConfig {
    /// Number of singular triples kept (k)
    pub latent_dims: usize,
}

impl Default for FactorizationConfig {
    fn default() -> Self {
        Self { latent_dims: 15 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub max_results: usize,
    pub mode: RankingMode,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            max_results: MAX_RESULTS,
            mode: RankingMode::Weighted,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Minimum TF-IDF cosine (0.0 - 1.0)
    pub threshold: f64,
    pub max_results: usize,
    /// Fall back to Jaro-Winkler when TF-IDF finds nothing
    pub fuzzy_fallback: bool,
    /// Minimum fuzzy score (0.0 - 100.0)
    pub fuzzy_min_score: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            max_results: MAX_RESULTS,
            fuzzy_fallback: true,
            fuzzy_min_score: 70.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub db_path: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: "recipe_engine.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| RecipeEngineError::io(path, e))?;

        serde_yaml::from_str(&contents)
            .map_err(|e| RecipeEngineError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load from `path` if given, otherwise defaults; then apply env overrides and validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `RECIPE_DATA_DIR`, `DB_PATH`, `PORT` and `LATENT_DIMS`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("RECIPE_DATA_DIR") {
            self.data = self.data.with_dir(dir);
        }
        if let Ok(db_path) = std::env::var("DB_PATH") {
            self.cache.db_path = db_path;
        }
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            self.server.port = port;
        }
        if let Some(k) = std::env::var("LATENT_DIMS")
            .ok()
            .and_then(|k| k.parse::<usize>().ok())
        {
            self.factorization.latent_dims = k;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.factorization.latent_dims == 0 {
            return Err(RecipeEngineError::Config(
                "latent_dims must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.matcher.threshold) {
            return Err(RecipeEngineError::Config(format!(
                "matcher threshold {} is outside 0.0..=1.0",
                self.matcher.threshold
            )));
        }
        if !(0.0..=100.0).contains(&self.matcher.fuzzy_min_score) {
            return Err(RecipeEngineError::Config(format!(
                "fuzzy_min_score {} is outside 0.0..=100.0",
                self.matcher.fuzzy_min_score
            )));
        }
        for (name, value) in [
            ("ranking.max_results", self.ranking.max_results),
            ("matcher.max_results", self.matcher.max_results),
        ] {
            if value == 0 || value > MAX_RESULTS {
                return Err(RecipeEngineError::Config(format!(
                    "{} must be between 1 and {}",
                    name, MAX_RESULTS
                )));
            }
        }
        if self.server.port == 0 {
            return Err(RecipeEngineError::Config("Server port cannot be 0".to_string()));
        }
        self.weights.validate()
    }
}
