//! API response types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cadastro_common::ProcessingOutcome;
use serde::{Deserialize, Serialize};

/// Body returned by the manual processing endpoint
///
/// `error` is always present and `null` on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessFileResponse {
    pub success: bool,
    pub file_id: String,
    pub record_count: usize,
    pub rejected_rows: usize,
    pub published: usize,
    pub failed_sends: usize,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

impl From<&ProcessingOutcome> for ProcessFileResponse {
    fn from(outcome: &ProcessingOutcome) -> Self {
        let counts = outcome.counts();
        Self {
            success: outcome.is_success(),
            file_id: outcome.file_id().to_string(),
            record_count: counts.record_count,
            rejected_rows: counts.rejected_rows,
            published: counts.published,
            failed_sends: counts.failed_sends,
            elapsed_ms: outcome.elapsed_ms(),
            error: outcome.error().map(str::to_string),
        }
    }
}

impl IntoResponse for ProcessFileResponse {
    fn into_response(self) -> Response {
        let status = if self.success {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(self)).into_response()
    }
}

/// Liveness probe body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

impl HealthResponse {
    pub fn up(service: impl Into<String>) -> Self {
        Self {
            status: "UP".to_string(),
            service: service.into(),
        }
    }
}
