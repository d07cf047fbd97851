use crate::types::{ApiFailure, LeaderboardQuery, LeaderboardResponse, SaveGameResponse};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use quizboard_core::{
    AppStats, ChallengeView, ClaimOutcome, GameSubmission, HealthReport, ProfileView,
};
use quizboard_store::ProgressionEngine;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

type ApiResult<T> = Result<Json<T>, ApiFailure>;

/// The HTTP front of the progression engine.
///
/// Routes:
/// - `POST /api/save_game`
/// - `GET /api/profile/:user_id`
/// - `GET /api/leaderboard/:category` (`?limit=N`)
/// - `GET /api/daily_challenge/:user_id`
/// - `POST /api/daily_challenge/:user_id/claim`
/// - `GET /api/stats`
/// - `GET /health`
pub struct GatewayServer {
    engine: Arc<ProgressionEngine>,
    host: String,
    port: u16,
}

impl GatewayServer {
    pub fn new(engine: Arc<ProgressionEngine>, host: &str, port: u16) -> Self {
        Self {
            engine,
            host: host.to_string(),
            port,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Build the router with permissive CORS.
    pub fn router(engine: Arc<ProgressionEngine>) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/api/save_game", post(save_game))
            .route("/api/profile/:user_id", get(get_profile))
            .route("/api/leaderboard/:category", get(get_leaderboard))
            .route("/api/daily_challenge/:user_id", get(get_daily_challenge))
            .route("/api/daily_challenge/:user_id/claim", post(claim_daily_reward))
            .route("/api/stats", get(get_stats))
            .layer(CorsLayer::permissive())
            .with_state(engine)
    }

    /// Bind and serve until the server stops.
    pub async fn serve(self) -> anyhow::Result<()> {
        let addr = self.addr();
        let app = Self::router(self.engine);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;
        tracing::info!("Gateway listening on {}", addr);
        axum::serve(listener, app).await?;
        Ok(())
    }

}

// ============================================================================
// Route handlers
// ============================================================================

async fn health(State(engine): State<Arc<ProgressionEngine>>) -> ApiResult<HealthReport> {
    Ok(Json(engine.health().await?))
}

async fn save_game(
    State(engine): State<Arc<ProgressionEngine>>,
    payload: Result<Json<GameSubmission>, JsonRejection>,
) -> ApiResult<SaveGameResponse> {
    let Json(submission) = payload?;
    let receipt = engine.submit_game(submission).await?;
    Ok(Json(receipt.into()))
}

async fn get_profile(
    State(engine): State<Arc<ProgressionEngine>>,
    Path(user_id): Path<String>,
) -> ApiResult<ProfileView> {
    Ok(Json(engine.get_profile(&user_id).await?))
}

async fn get_leaderboard(
    State(engine): State<Arc<ProgressionEngine>>,
    Path(category): Path<String>,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<LeaderboardResponse> {
    let entries = engine.get_leaderboard(&category, query.limit).await?;
    Ok(Json(LeaderboardResponse {
        category: category.trim().to_lowercase(),
        entries,
    }))
}

async fn get_daily_challenge(
    State(engine): State<Arc<ProgressionEngine>>,
    Path(user_id): Path<String>,
) -> ApiResult<ChallengeView> {
    Ok(Json(engine.get_daily_challenge(&user_id).await?))
}

async fn claim_daily_reward(
    State(engine): State<Arc<ProgressionEngine>>,
    Path(user_id): Path<String>,
) -> ApiResult<ClaimOutcome> {
    Ok(Json(engine.claim_daily_reward(&user_id).await?))
}

async fn get_stats(State(engine): State<Arc<ProgressionEngine>>) -> ApiResult<AppStats> {
    Ok(Json(engine.get_app_stats().await?))
}
