use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recipe_engine::{
    error::RecipeEngineError, DishListing, EngineConfig, MatrixStats, NameMatchResponse,
    RankingMode, RecipeEngine, SimilarQuery, SimilarityResponse,
};

#[derive(Clone)]
struct AppState {
    engine: Arc<RecipeEngine>,
}

#[derive(Debug, Deserialize)]
struct MatchRequest {
    query: String,
}

#[derive(Debug, Deserialize)]
struct SimilarRequest {
    dish: String,
    #[serde(default)]
    max_results: Option<usize>,
    #[serde(default = "default_true")]
    weighted: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct SelectionRequest {
    dish: String,
}

#[derive(Debug, Deserialize)]
struct NameSearchParams {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Debug, Serialize)]
struct DishesResponse {
    dishes: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RecipesResponse {
    recipes: Vec<DishListing>,
}

#[derive(Debug, Serialize)]
struct SelectionResponse {
    dish: String,
}

#[derive(Debug, Serialize)]
struct FlavorsResponse {
    dish: String,
    flavors: Vec<FlavorCountDto>,
}

#[derive(Debug, Serialize)]
struct FlavorCountDto {
    flavor: String,
    count: f64,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    cache: Option<CacheStatsDto>,
    matrix: MatrixStats,
}

#[derive(Debug, Serialize)]
struct CacheStatsDto {
    total_entries: u64,
    total_hits: u64,
    avg_hit_count: f64,
}

#[derive(Debug, Serialize)]
struct ReloadResponse {
    status: String,
    dishes: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recipe_engine_server=debug,recipe_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("RECIPE_ENGINE_CONFIG").ok();
    let config = EngineConfig::load(config_path.as_deref().map(std::path::Path::new))?;

    tracing::info!("Starting Recipe Engine Server");
    tracing::info!("Flavors: {}", config.data.flavors_dir.display());
    tracing::info!("Recipes: {}", config.data.recipes_path.display());
    tracing::info!("Cache: {} (enabled: {})", config.cache.db_path, config.cache.enabled);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let engine = RecipeEngine::open(config).await?;

    let state = AppState {
        engine: Arc::new(engine),
    };

    // Build router
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/v1/dishes", get(dishes_handler))
        .route("/v1/dishes/:name/flavors", get(flavors_handler))
        .route("/v1/recipes", get(recipes_handler))
        .route("/v1/match", post(match_handler))
        .route("/v1/similar", post(similar_handler))
        .route("/v1/selection", post(selection_handler))
        .route("/v1/selection/similar", get(selection_similar_handler))
        .route("/v1/stats", get(stats_handler))
        .route("/v1/reload", post(reload_handler))
        .layer(CorsLayer::permissive())
        .with_state(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: recipe_engine::VERSION.to_string(),
    })
}

async fn dishes_handler(State(state): State<AppState>) -> Json<DishesResponse> {
    Json(DishesResponse {
        dishes: state.engine.dish_names().await,
    })
}

async fn recipes_handler(
    State(state): State<AppState>,
    Query(params): Query<NameSearchParams>,
) -> Result<Json<RecipesResponse>, AppError> {
    if params.name.trim().is_empty() {
        return Err(RecipeEngineError::InvalidInput("name parameter is required".to_string()).into());
    }
    Ok(Json(RecipesResponse {
        recipes: state.engine.search_names(&params.name).await,
    }))
}

async fn match_handler(
    State(state): State<AppState>,
    Json(req): Json<MatchRequest>,
) -> Json<NameMatchResponse> {
    tracing::debug!("Match request: {:?}", req);
    Json(state.engine.match_names(&req.query).await)
}

async fn similar_handler(
    State(state): State<AppState>,
    Json(req): Json<SimilarRequest>,
) -> Result<Json<SimilarityResponse>, AppError> {
    tracing::debug!("Similar request: {:?}", req);

    let mode = if req.weighted {
        RankingMode::Weighted
    } else {
        RankingMode::Raw
    };
    let mut query = SimilarQuery::new(req.dish).with_mode(mode);
    query.max_results = req.max_results;

    let result = state.engine.similar(query).await?;

    tracing::info!("{} ({:.2}ms)", result.display(), result.latency_ms);

    Ok(Json(result))
}

async fn selection_handler(
    State(state): State<AppState>,
    Json(req): Json<SelectionRequest>,
) -> Result<Json<SelectionResponse>, AppError> {
    let dish = state.engine.submit_selection(&req.dish).await?;
    Ok(Json(SelectionResponse { dish }))
}

async fn selection_similar_handler(
    State(state): State<AppState>,
) -> Result<Json<SimilarityResponse>, AppError> {
    Ok(Json(state.engine.similar_to_selection().await?))
}

async fn flavors_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<FlavorsResponse>, AppError> {
    let flavors = state.engine.flavor_profile(&name).await?;
    Ok(Json(FlavorsResponse {
        dish: name,
        flavors: flavors
            .into_iter()
            .map(|(flavor, count)| FlavorCountDto { flavor, count })
            .collect(),
    }))
}

async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let cache = state.engine.cache_stats().await?.map(|stats| CacheStatsDto {
        total_entries: stats.total_entries,
        total_hits: stats.total_hits,
        avg_hit_count: stats.avg_hit_count,
    });

    Ok(Json(StatsResponse {
        cache,
        matrix: state.engine.matrix_stats().await,
    }))
}

async fn reload_handler(State(state): State<AppState>) -> Result<Json<ReloadResponse>, AppError> {
    state.engine.reload().await?;
    Ok(Json(ReloadResponse {
        status: "reloaded".to_string(),
        dishes: state.engine.context().await.corpus().len(),
    }))
}

// Error handling
struct AppError(RecipeEngineError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.is_not_found() {
            StatusCode::NOT_FOUND
        } else if matches!(self.0, RecipeEngineError::InvalidInput(_)) {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let message = self.0.to_string();

        if status.is_server_error() {
            tracing::error!("Error: {} - {}", status, message);
        } else {
            tracing::debug!("Rejected request: {} - {}", status, message);
        }

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<RecipeEngineError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
