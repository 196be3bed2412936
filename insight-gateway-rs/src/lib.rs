// insight-gateway-rs/src/lib.rs
// HTTP surface for the Telemetry Insight services.
//
// Routes:
// - POST /api/v1/query               natural-language question -> QueryResponse
// - POST /api/v1/telemetry           batch of readings -> {stored, anomalies}
// - GET  /api/v1/telemetry/anomalies most recently analyzed readings
// - GET  /api/v1/health              liveness plus dependency status

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use once_cell::sync::Lazy;
use query_router::{Question, QueryEngine};
use serde::{Deserialize, Serialize};
use structured_store::StructuredStore;
use telemetry_pipeline::{CircuitState, IngestError, RepositoryError, TelemetryPipeline, TelemetryRecord};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

#[cfg(test)]
mod tests;

/// Maximum request payload size (1MB)
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

const DEFAULT_ANOMALY_LIMIT: usize = 20;
const MAX_ANOMALY_LIMIT: usize = 200;

static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueryEngine>,
    pub pipeline: Arc<TelemetryPipeline>,
    pub store: Arc<dyn StructuredStore>,
}

/// Query request body (JSON)
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub text: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnomalyParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub service_name: String,
    pub uptime_seconds: u64,
    pub status: String,
    pub store_reachable: bool,
    pub oracle_circuit: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

/// Errors surfaced to HTTP clients
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Body that is not JSON or does not fit the expected shape
    #[error("Invalid request: {}", .0.body_text())]
    Body(#[from] JsonRejection),

    #[error("{0}")]
    Ingest(#[from] IngestError),

    #[error("Failed to read telemetry: {0}")]
    Repository(#[from] RepositoryError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Body(rejection) => rejection.status(),
            Self::Ingest(_) | Self::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{}", self);
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
                code: status.as_u16(),
            }),
        )
            .into_response()
    }
}

/// Build the HTTP router with its middleware
pub fn build_router(state: AppState) -> Router {
    let _ = *START_TIME;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/query", post(query_handler))
        .route("/api/v1/telemetry", post(telemetry_handler))
        .route("/api/v1/telemetry/anomalies", get(anomalies_handler))
        .layer(RequestBodyLimitLayer::new(MAX_PAYLOAD_SIZE))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// POST /api/v1/query - Answer a natural-language question
async fn query_handler(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let text = request.text.trim();
    if text.is_empty() {
        return Err(ApiError::InvalidRequest("text must not be empty".to_string()));
    }

    let session_id = request
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    log::info!("Query request: session={}", session_id);
    let response = state.engine.handle(Question::new(text, session_id)).await;
    Ok(Json(response))
}

/// POST /api/v1/telemetry - Store and analyze a batch of readings
async fn telemetry_handler(
    State(state): State<AppState>,
    payload: Result<Json<Vec<TelemetryRecord>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(batch) = payload?;
    log::info!("Telemetry batch of {} record(s)", batch.len());
    let summary = state.pipeline.ingest(batch).await?;
    Ok(Json(summary))
}

/// GET /api/v1/telemetry/anomalies - Most recently analyzed readings
async fn anomalies_handler(
    State(state): State<AppState>,
    Query(params): Query<AnomalyParams>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_ANOMALY_LIMIT)
        .clamp(1, MAX_ANOMALY_LIMIT);
    let anomalies = state.pipeline.recent_anomalies(limit).await?;
    Ok(Json(anomalies))
}

/// GET /api/v1/health - Health check endpoint
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let store_reachable = state.store.list_tables().await.is_ok();
    let circuit = state.pipeline.analyzer().circuit().state();

    let status = match (store_reachable, circuit) {
        (true, CircuitState::Closed) => "SERVING",
        (true, _) => "DEGRADED",
        (false, _) => "CRITICAL",
    };

    Json(HealthResponse {
        healthy: store_reachable,
        service_name: "insight-gateway".to_string(),
        uptime_seconds: START_TIME.elapsed().as_secs(),
        status: status.to_string(),
        store_reachable,
        oracle_circuit: circuit.to_string(),
    })
}

/// GET / - Root endpoint
async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "Telemetry Insight Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "GET /api/v1/health",
            "POST /api/v1/query",
            "POST /api/v1/telemetry",
            "GET /api/v1/telemetry/anomalies"
        ]
    }))
}
