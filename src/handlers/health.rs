use axum::{extract::State, Json};

use crate::errors::AppError;
use crate::models::health::HealthResponse;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check with monitor progress", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let status = state.wave_state.status.read().await;
    let samples_seen = status.report.as_ref().map_or(0, |report| report.samples);

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        tracking_day: status.day.clone(),
        samples_seen,
    }))
}
