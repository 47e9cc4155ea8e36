//! HTTP API for TrialScout.
//!
//! - `GET /health`, `GET /ping`: liveness
//! - `GET /api/search-studies?input=...`: patient description → extracted
//!   registry parameters → every matching study record
//! - `POST /api/ask`: question → grounded answer from the study index
//!
//! Built on Axum. The index must be built before [`serve`] binds.

pub mod error;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Query, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;
use trialscout_agent::{AnsweringAgent, Source};
use trialscout_index::{IndexHandle, IndexStats};
use trialscout_registry::{ParameterExtractor, RegistryClient};

pub use error::{ApiError, ErrorResponse};

/// Request bodies above this size are rejected.
pub const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Everything the handlers need. Built once at startup, read-only after.
pub struct AppState {
    pub extractor: ParameterExtractor,
    pub registry: RegistryClient,
    pub agent: AnsweringAgent,
    pub index: IndexHandle,
}

pub type SharedState = Arc<AppState>;

/// Build the router with all routes and layers:
/// permissive CORS, a 1 MB body limit, and HTTP trace logging.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ping", get(ping_handler))
        .route("/api/search-studies", get(search_studies_handler))
        .route("/api/ask", post(ask_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(state: SharedState, addr: &str) -> std::io::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Gateway listening");
    axum::serve(listener, app).await
}

// --- Handlers ---

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub index: Option<IndexStats>,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        index: state.index.stats().cloned(),
    })
}

async fn ping_handler() -> Json<[&'static str; 1]> {
    Json(["pong"])
}

#[derive(Debug, Deserialize)]
struct SearchStudiesQuery {
    input: Option<String>,
}

async fn search_studies_handler(
    State(state): State<SharedState>,
    Query(query): Query<SearchStudiesQuery>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    let input = query
        .input
        .ok_or_else(|| ApiError::bad_request("Missing 'input' query parameter"))?;
    info!(input_len = input.len(), "Study search request");

    let params = state.extractor.extract(&input).await?;
    let studies = state.registry.fetch_studies(&params).await?;

    Ok(Json(studies.into_iter().map(|s| s.into_value()).collect()))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub iterations: u32,
    pub tool_calls: usize,
    pub sources: Vec<Source>,
}

async fn ask_handler(
    State(state): State<SharedState>,
    Json(payload): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let question = payload.question.trim();
    if question.is_empty() {
        return Err(ApiError::bad_request("'question' must not be empty"));
    }
    info!(question_len = question.len(), "Ask request");

    let result = state.agent.run(question).await?;

    Ok(Json(AskResponse {
        answer: result.answer,
        iterations: result.iterations,
        tool_calls: result.tool_calls_made,
        sources: result.sources,
    }))
}
