use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::StatusCode, response::{IntoResponse, Response}, routing::get, Json, Router};
use bookrec_core::persist::{load_meta, load_snapshot, ArtifactPaths, EncoderKind};
use bookrec_core::{EngineConfig, HashingEncoder, RecError, Recommendation, RecommendationEngine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SampleParams {
    pub k: Option<usize>,
}

#[derive(Serialize)]
pub struct RecsResponse {
    pub query: String,
    pub took_s: f64,
    pub results: Vec<RecHit>,
}

#[derive(Serialize)]
pub struct RecHit {
    pub rank: usize,
    pub item_id: String,
    pub title: String,
    pub score: f32,
}

#[derive(Serialize)]
pub struct SampleResponse {
    pub result: Vec<SampleRow>,
}

#[derive(Serialize)]
pub struct SampleRow {
    pub user_id: String,
    pub item_id: String,
    pub title: String,
    pub rating: f32,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: RecommendationEngine,
}

/// Load artifacts from `artifacts_dir` once and wire the routes over them.
pub fn build_app(artifacts_dir: &str, config: EngineConfig) -> Result<Router> {
    let paths = ArtifactPaths::new(artifacts_dir);
    let meta = load_meta(&paths)?;
    if meta.encoder != EncoderKind::Hashing {
        tracing::warn!(encoder = ?meta.encoder, "item embeddings were not hashing-encoded, free-text results will not be comparable");
    }
    let snapshot = load_snapshot(&paths)?;
    let encoder = Arc::new(HashingEncoder::new(snapshot.index().dim().max(1))?);
    let engine = RecommendationEngine::new(Arc::new(snapshot), encoder, config)?;
    Ok(router(engine))
}

pub fn router(engine: RecommendationEngine) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/cbf/:query", get(cbf_handler))
        .route("/api/cbf_lib/:book_id", get(cbf_lib_handler))
        .route("/api/cf/:user_id", get(cf_handler))
        .route("/api/sample_users", get(sample_handler))
        .with_state(AppState { engine })
        .layer(TraceLayer::new_for_http())
}

pub async fn cbf_handler(State(state): State<AppState>, Path(query): Path<String>) -> Result<Json<RecsResponse>, ApiError> {
    let start = std::time::Instant::now();
    // Encoding is the slow step; keep it off the async workers.
    let engine = state.engine.clone();
    let q = query.clone();
    let recs = tokio::task::spawn_blocking(move || engine.cbf_query(&q))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(respond(query, start, recs)))
}

pub async fn cbf_lib_handler(State(state): State<AppState>, Path(book_id): Path<String>) -> Result<Json<RecsResponse>, ApiError> {
    let start = std::time::Instant::now();
    let recs = state.engine.cbf_by_item(&book_id)?;
    Ok(Json(respond(book_id, start, recs)))
}

pub async fn cf_handler(State(state): State<AppState>, Path(user_id): Path<String>) -> Result<Json<RecsResponse>, ApiError> {
    let start = std::time::Instant::now();
    let recs = state.engine.cf_query(&user_id)?;
    Ok(Json(respond(user_id, start, recs)))
}

pub async fn sample_handler(State(state): State<AppState>, Query(params): Query<SampleParams>) -> Result<Json<SampleResponse>, ApiError> {
    let k = params.k.unwrap_or(state.engine.config().sample_size);
    let result = state
        .engine
        .sample(k)?
        .into_iter()
        .map(|s| SampleRow { user_id: s.user_id.to_string(), item_id: s.item_id.to_string(), title: s.title, rating: s.rating })
        .collect();
    Ok(Json(SampleResponse { result }))
}

fn respond(query: String, start: std::time::Instant, recs: Vec<Recommendation>) -> RecsResponse {
    let results = recs
        .into_iter()
        .enumerate()
        .map(|(rank, r)| RecHit { rank, item_id: r.item_id.to_string(), title: r.title, score: r.score })
        .collect();
    RecsResponse { query, took_s: start.elapsed().as_secs_f64(), results }
}

#[derive(Debug)]
pub enum ApiError {
    Rec(RecError),
    Internal(String),
}

impl From<RecError> for ApiError {
    fn from(e: RecError) -> Self { ApiError::Rec(e) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::Rec(e) => {
                let status = match &e {
                    RecError::InvalidInput(_) | RecError::InsufficientColumns { .. } => StatusCode::BAD_REQUEST,
                    RecError::UnknownItem { .. } | RecError::UnknownUser { .. } => StatusCode::NOT_FOUND,
                    RecError::EncodingError(_) | RecError::DimensionMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    RecError::EmptyIndex | RecError::InvalidSnapshot(_) => StatusCode::SERVICE_UNAVAILABLE,
                };
                (status, e.kind(), e.to_string())
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal", msg),
        };
        tracing::warn!(%status, kind, %message, "request rejected");
        (status, Json(serde_json::json!({ "error": kind, "message": message }))).into_response()
    }
}
