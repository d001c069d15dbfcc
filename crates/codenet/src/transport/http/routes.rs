//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Serialize;

use crate::handoff::Submitter;
use crate::health::HealthResponse;
use crate::request::AnalysisRequest;

/// Largest accepted `/analyze` body. File contents are sent whole.
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// State shared by the bridge handlers.
pub struct BridgeState {
    pub submitter: Submitter,
    pub agent_id: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeAccepted {
    pub status: &'static str,
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn bad_request(error: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error })).into_response()
}

async fn analyze(State(state): State<Arc<BridgeState>>, body: Bytes) -> Response {
    let request = match AnalysisRequest::decode(&body) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected analysis request");
            return bad_request(e.to_string());
        }
    };

    tracing::info!(
        filename = %request.filename,
        bytes = request.content.len(),
        "Received analysis request"
    );

    let filename = request.filename.clone();
    if let Err(e) = state.submitter.submit(request).await {
        tracing::error!(filename = %filename, error = %e, "Failed to enqueue analysis request");
        return bad_request(e.to_string());
    }

    (
        StatusCode::OK,
        Json(AnalyzeAccepted {
            status: "success",
            filename,
        }),
    )
        .into_response()
}

async fn health(State(state): State<Arc<BridgeState>>) -> Json<HealthResponse> {
    Json(HealthResponse::ok(state.agent_id.clone()))
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

pub fn routes(state: Arc<BridgeState>) -> Router {
    Router::new()
        .route("/analyze", post(analyze).fallback(not_found))
        .route("/health", get(health).fallback(not_found))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
