use clap::{Parser, Subcommand};
use recipe_engine::{EngineConfig, RankingMode, RecipeEngine, SimilarQuery};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "recipe-engine-cli")]
#[command(about = "Recipe Engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory (flavors/, reduced-recipe.json, reviews.json)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Database path
    #[arg(long)]
    db: Option<String>,

    /// Disable the artifact cache
    #[arg(long)]
    no_cache: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build (or load cached) matrices and report corpus statistics
    Build,

    /// Dishes most similar to a dish
    Similar {
        /// Dish name
        dish: String,

        /// Maximum results (at most 10)
        #[arg(short, long, default_value = "10")]
        max_results: usize,

        /// Rank by cosine similarity only, ignoring reviews
        #[arg(long)]
        raw: bool,
    },

    /// Match free text against dish names
    Match {
        /// Text to match
        text: String,
    },

    /// Flavor profile of a dish
    Flavors {
        /// Dish name
        dish: String,
    },

    /// Strongest flavors per latent dimension
    Dimensions {
        /// Flavors shown per dimension
        #[arg(short, long, default_value = "5")]
        top: usize,
    },

    /// Get cache statistics
    Stats,

    /// Clean up old cache entries
    Cleanup {
        /// Maximum age in days
        #[arg(short, long, default_value = "30")]
        max_age_days: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recipe_engine=warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = EngineConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.data_dir {
        config.data = config.data.with_dir(dir);
    }
    if let Some(db) = cli.db {
        config.cache.db_path = db;
    }
    if cli.no_cache {
        config.cache.enabled = false;
    }

    let engine = RecipeEngine::open(config).await?;

    match cli.command {
        Commands::Build => {
            let context = engine.context().await;
            let stats = context.matrix().stats();

            println!("Corpus built");
            println!("   Dishes: {}", stats.dishes);
            println!("   Flavors: {}", stats.flavors);
            println!("   Latent dimensions: {}", context.factorization().dimensions());
            println!("   Ingredients matched: {:.1}%", stats.match_rate() * 100.0);
            println!("   Empty dishes: {}", stats.empty_dishes);
            println!("   Rated dishes: {}", context.reviews().rated_count());
            println!("   From cache: {}", context.from_cache());
            println!("   Fingerprint: {}", context.key().fingerprint);

            if !stats.top_unmatched.is_empty() {
                println!("\nMost frequent unmatched ingredients:");
                for (name, count) in &stats.top_unmatched {
                    println!("   {} ({})", name, count);
                }
            }
        }

        Commands::Similar {
            dish,
            max_results,
            raw,
        } => {
            let mode = if raw {
                RankingMode::Raw
            } else {
                RankingMode::Weighted
            };
            let query = SimilarQuery::new(dish)
                .with_max_results(max_results)
                .with_mode(mode);

            let response = engine.similar(query).await?;

            println!("Dishes similar to: {}", response.query);
            for dish in &response.results {
                let rating = dish
                    .rating
                    .map(|r| format!("{:.1} ({} reviews)", r, dish.review_count))
                    .unwrap_or_else(|| "unrated".to_string());
                println!(
                    "   {}. {} | score {:.3} | cosine {:.3} | {}",
                    dish.rank, dish.name, dish.weighted_score, dish.similarity, rating
                );
            }
            println!("   Latency: {:.2}ms", response.latency_ms);
        }

        Commands::Match { text } => {
            let response = engine.match_names(&text).await;

            if response.is_empty() {
                println!("No dish names match: {}", text);
            } else {
                println!("Matches for '{}' ({:?}):", text, response.method);
                for (i, m) in response.matches.iter().enumerate() {
                    println!("   {}. {} ({:.3})", i + 1, m.name, m.score);
                }
            }
        }

        Commands::Flavors { dish } => {
            let profile = engine.flavor_profile(&dish).await?;

            println!("Flavor profile of {}:", dish);
            for (flavor, count) in profile {
                println!("   {:<24} {}", flavor, count);
            }
        }

        Commands::Dimensions { top } => {
            for dim in engine.latent_diagnostics(top).await {
                let flavors: Vec<String> = dim
                    .top_flavors
                    .iter()
                    .map(|(flavor, loading)| format!("{} ({:+.3})", flavor, loading))
                    .collect();
                println!(
                    "   #{:<3} σ={:<10.3} {}",
                    dim.dimension,
                    dim.singular_value,
                    flavors.join(", ")
                );
            }
        }

        Commands::Stats => {
            let Some(stats) = engine.cache_stats().await? else {
                println!("Artifact cache is disabled");
                return Ok(());
            };

            println!("Cache Statistics:");
            println!("   Total entries: {}", stats.total_entries);
            println!("   Total hits: {}", stats.total_hits);
            println!("   Avg hits/entry: {:.2}", stats.avg_hit_count);

            if let Some(oldest) = stats.oldest_entry {
                println!("   Oldest entry: {}", oldest.format("%Y-%m-%d %H:%M:%S"));
            }

            if let Some(newest) = stats.newest_entry {
                println!("   Newest entry: {}", newest.format("%Y-%m-%d %H:%M:%S"));
            }
        }

        Commands::Cleanup { max_age_days } => {
            println!("Cleaning up entries older than {} days...", max_age_days);

            let deleted = engine.cleanup_cache(max_age_days).await?;

            println!("Deleted {} entries", deleted);
        }
    }

    Ok(())
}
