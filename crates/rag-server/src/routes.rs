use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use rag_core::{Document, SearchResult};
use rag_drift::{DriftSuite, SuiteReport};
use rag_engine::CollectionStats;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::state::AppState;

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/stats", get(stats))
}

pub fn document_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/documents", post(add_documents))
        .route("/api/v1/search", post(search))
}

pub fn drift_routes() -> Router<AppState> {
    Router::new().route("/api/v1/drift", post(run_drift))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "rag-server",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

async fn stats(State(state): State<AppState>) -> ApiResult<Json<CollectionStats>> {
    Ok(Json(state.engine.get_stats().await?))
}

#[derive(Debug, Deserialize)]
pub struct AddDocumentsRequest {
    pub documents: Vec<Document>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddDocumentsResponse {
    pub upserted: usize,
}

async fn add_documents(
    State(state): State<AppState>,
    body: Result<Json<AddDocumentsRequest>, JsonRejection>,
) -> ApiResult<Json<AddDocumentsResponse>> {
    let Json(req) = body?;
    let upserted = state.engine.add_documents(&req.documents).await?;
    Ok(Json(AddDocumentsResponse { upserted }))
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: Option<usize>,
    pub threshold: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

async fn search(
    State(state): State<AppState>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> ApiResult<Json<SearchResponse>> {
    let Json(req) = body?;
    let config = state.engine.config();
    let top_k = req.top_k.unwrap_or(config.top_k);
    let threshold = req.threshold.unwrap_or(config.similarity_threshold);
    let results = state.engine.search(&req.query, top_k, threshold).await?;
    Ok(Json(SearchResponse { results }))
}

async fn run_drift(
    State(state): State<AppState>,
    body: Result<Json<DriftSuite>, JsonRejection>,
) -> ApiResult<Json<SuiteReport>> {
    let Json(mut suite) = body?;
    suite.validate()?;
    if suite.name.is_empty() {
        suite.name = state.engine.config().collection_name.clone();
    }
    Ok(Json(state.harness.run(&suite).await))
}
