//! Health check.

use axum::{extract::State, Json};

use crate::error::ApiError;
use crate::models::HealthResponse;
use crate::AppState;

/// Liveness plus a ping of the account store the edge depends on.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse),
        (status = 500, description = "A dependency is unreachable")
    ),
    tag = "health"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, ApiError> {
    state.access.ping().await?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}
