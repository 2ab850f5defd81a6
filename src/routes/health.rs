use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::json;

use crate::server::AppState;

/// Health check endpoint handler.
///
/// Returns a static JSON body so load balancers and uptime monitors can
/// verify the server is accepting connections.
///
/// # Route
/// - **Method**: GET
/// - **Path**: `/ping`
/// - **Response**: `{"status":"pong"}`
pub async fn ping() -> Json<serde_json::Value> {
    Json(json!({ "status": "pong" }))
}

/// Deep health check: also round-trips a query through the connection pool.
///
/// Returns 200 when the database answers, 503 otherwise. Suitable for
/// readiness probes, where `/ping` only covers liveness.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    match state.db.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "database": "up" })),
        ),
        Err(e) => {
            tracing::warn!("health check failed: {e:#}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "database": "down" })),
            )
        }
    }
}
