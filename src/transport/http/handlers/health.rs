use crate::transport::http::types::{AppState, HealthResponse};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy (store reachable)", body = HealthResponse),
        (status = 503, description = "Service is unhealthy (store unreachable)", body = HealthResponse)
    )
)]
pub async fn healthcheck_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.service.store().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                success: true,
                status: "ok".to_string(),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    success: false,
                    status: "unhealthy".to_string(),
                    error: Some(format!("store ping failed: {}", e)),
                }),
            )
        }
    }
}
