use super::AppState;
use crate::core::cache::{NAMESPACE, derive_key};
use crate::core::{AggregatorError, CacheStatsSnapshot, TokenomicsRecord};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    pub message: String,
    pub data: T,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
    detail: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct CacheStatusResponse {
    namespace: &'static str,
    identifier: String,
    cache_key: String,
    ttl_seconds: u64,
    remaining_ttl_seconds: Option<u64>,
    cache_performance: CacheStatsSnapshot,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/tokenomics", get(tokenomics))
        .route("/health", get(health))
        .route("/cache/status", get(cache_status))
        .with_state(state)
}

fn status_for(e: &AggregatorError) -> StatusCode {
    match e {
        AggregatorError::InvalidAddress => StatusCode::BAD_REQUEST,
        AggregatorError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        AggregatorError::TaskAborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn tokenomics(State(state): State<Arc<AppState>>) -> Response {
    match state.aggregator.get_tokenomics(&state.asset_address).await {
        Ok(record) => Json(SuccessResponse::<TokenomicsRecord> {
            message: "Market data retrieved successfully".to_string(),
            data: record,
        })
        .into_response(),
        Err(e) => {
            error!(error = %e, "Tokenomics request failed");
            let body = ErrorResponse {
                message: "Failed to retrieve market data".to_string(),
                detail: e.to_string(),
            };
            (status_for(&e), Json(body)).into_response()
        }
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "Tokenomics API is running",
    })
}

async fn cache_status(State(state): State<Arc<AppState>>) -> Json<CacheStatusResponse> {
    let remaining = state.aggregator.cached_ttl(&state.asset_address).await;
    Json(CacheStatusResponse {
        namespace: NAMESPACE,
        identifier: state.asset_address.clone(),
        cache_key: derive_key(&state.asset_address).to_string(),
        ttl_seconds: state.aggregator.settings().ttl.as_secs(),
        remaining_ttl_seconds: remaining.map(|d| d.as_secs()),
        cache_performance: state.aggregator.stats(),
    })
}
