//! HTTP surface
//!
//! - `POST /api/cadastro/process?fileName=<key>` - process one file now
//! - `GET /api/cadastro/health` - liveness probe, independent of pipeline health
//! - `GET /api` - plain-text probe

pub mod response;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::AppError;
use crate::ingest::IngestOrchestrator;
use crate::middleware;
use response::{HealthResponse, ProcessFileResponse};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<IngestOrchestrator>,
    pub service_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ProcessFileParams {
    #[serde(rename = "fileName", alias = "fileId")]
    pub file_name: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api", get(root))
        .route("/api/cadastro/health", get(health))
        .route("/api/cadastro/process", post(process_file))
        // path used by older clients
        .route("/api/cadastro/processar", post(process_file))
        .with_state(state)
        .layer(middleware::tracing_layer())
}

async fn root() -> &'static str {
    "api"
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse::up(state.service_name))
}

async fn process_file(
    State(state): State<AppState>,
    Query(params): Query<ProcessFileParams>,
) -> Result<ProcessFileResponse, AppError> {
    let file_name = params
        .file_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::BadRequest("query parameter 'fileName' is required".to_string()))?;

    tracing::info!(file_name = %file_name, "Manual processing requested");

    let outcome = state.orchestrator.process_file(&file_name).await;
    Ok(ProcessFileResponse::from(&outcome))
}
