pub mod documents;
pub mod installments;
pub mod organization;
pub mod payments;
pub mod sales;
pub mod sync;

use crate::services::metrics::get_metrics;
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

/// Health check probing database connectivity.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.db.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "service": "fiscal-service" })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "service": "fiscal-service" })),
            )
        }
    }
}

/// Prometheus metrics endpoint.
pub async fn metrics() -> String {
    get_metrics()
}
