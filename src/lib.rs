//! # Recipe Engine
//!
//! Flavor-based recipe recommendation engine with:
//! - Ingredient flavor catalog and dish × flavor count matrix
//! - Truncated SVD latent space (nalgebra)
//! - Cosine ranking weighted by review popularity
//! - TF-IDF dish name matching with a rapidfuzz fallback
//! - SQLite artifact cache keyed by input fingerprint
//! - Multiple interfaces: Rust library, HTTP API, CLI
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use recipe_engine::{EngineConfig, RecipeEngine, SimilarQuery};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EngineConfig::load(None)?;
//!     let engine = RecipeEngine::open(config).await?;
//!
//!     let response = engine.similar(SimilarQuery::new("pulled pork")).await?;
//!     for dish in &response.results {
//!         println!("{}. {} ({:.3})", dish.rank, dish.name, dish.weighted_score);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod core;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod features;
pub mod ranking;
pub mod reviews;

// Re-export primary types
pub use crate::cache::{ArtifactCache, CacheStats, SqliteArtifactCache};
pub use crate::config::{EngineConfig, MAX_RESULTS};
pub use crate::core::{
    DishListing, DishRecord, MatchMethod, NameMatch, NameMatchResponse, RankedDish, SimilarityResponse,
};
pub use crate::engine::{CorpusContext, LatentDimension, RecipeEngine, SimilarQuery};
pub use crate::error::{RecipeEngineError, Result};
pub use crate::features::MatrixStats;
pub use crate::ranking::RankingMode;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
