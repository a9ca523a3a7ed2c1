use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::router::ExporterState;

/// Liveness: answers as long as the process serves HTTP.
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn readyz(State(state): State<Arc<ExporterState>>) -> impl IntoResponse {
    if state.scheduler.ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}
