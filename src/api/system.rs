//! System endpoints: health check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::app_state::AppState;
use crate::database::{Session, SessionStats};
use crate::error::AppError;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"healthy"` when the store answered.
    pub status: &'static str,
    /// `PROJECT_NAME`.
    pub project: String,
    /// `VERSION`.
    pub version: String,
    /// RFC 3339 timestamp of the check.
    pub timestamp: String,
    /// Session counters at the time of the check. The health check's own
    /// session is still held, so `active` is at least 1.
    pub sessions: SessionStats,
}

/// `GET /health` — Pings the store through a request-scoped session.
///
/// # Errors
///
/// Returns an [`AppError`] (503) if no session can be acquired or the
/// ping fails.
pub async fn health_handler(
    State(state): State<AppState>,
    mut session: Session,
) -> Result<(StatusCode, Json<HealthResponse>), AppError> {
    session.ping().await?;
    tracing::debug!(session_id = %session.id(), "health check ok");

    Ok((
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy",
            project: state.settings.project_name.clone(),
            version: state.settings.version.clone(),
            timestamp: Utc::now().to_rfc3339(),
            sessions: state.sessions.stats(),
        }),
    ))
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}
