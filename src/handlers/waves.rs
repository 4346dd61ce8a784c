use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;
use validator::Validate;

use crate::business_logic::config::WaveConfig;
use crate::business_logic::wave_chain;
use crate::errors::AppError;
use crate::models::sample::from_points;
use crate::models::status::{DetectRequest, WaveSnapshot, WaveStatus};
use crate::models::wave::DetectionReport;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/waves",
    responses(
        (status = 200, description = "Wave detection status for the tracked day", body = WaveStatus)
    )
)]
pub async fn get_wave_status(State(state): State<AppState>) -> Result<Json<WaveStatus>, AppError> {
    let status = state.wave_state.status.read().await.clone();
    Ok(Json(status))
}

#[utoipa::path(
    get,
    path = "/waves/stream",
    responses(
        (status = 200, description = "SSE stream of wave status snapshots", content_type = "text/event-stream")
    )
)]
pub async fn get_wave_stream(
    State(state): State<AppState>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    let initial_status = state.wave_state.status.read().await.clone();
    let initial_snapshot = WaveSnapshot {
        as_of_ms: chrono::Utc::now().timestamp_millis() as u64,
        status: initial_status,
    };

    let initial_events = match snapshot_event(initial_snapshot) {
        Some(event) => vec![Ok(event)],
        None => Vec::new(),
    };
    let initial_stream = tokio_stream::iter(initial_events);

    let rx = state.wave_state.broadcaster.subscribe();
    let broadcast_stream = BroadcastStream::new(rx).filter_map(|message| match message {
        Ok(snapshot) => snapshot_event(snapshot).map(Ok),
        Err(BroadcastStreamRecvError::Lagged(_)) => None,
    });

    let stream = initial_stream.chain(broadcast_stream);

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

#[utoipa::path(
    post,
    path = "/waves/detect",
    request_body = DetectRequest,
    responses(
        (status = 200, description = "Detection report for the posted series", body = DetectionReport),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 422, description = "Series violates ordering", body = crate::errors::ErrorResponse)
    )
)]
pub async fn post_detect(
    State(state): State<AppState>,
    Json(request): Json<DetectRequest>,
) -> Result<Json<DetectionReport>, AppError> {
    request
        .validate()
        .map_err(|err| AppError::Validation(err.to_string()))?;

    let config = request_config(&state.wave_config, &request)?;
    let load = from_points(
        request
            .samples
            .iter()
            .map(|point| (point.timestamp, point.value)),
    );

    let report = wave_chain::detect("request", &load, &config, request.trace)?;
    tracing::debug!(
        "Ad-hoc detection over {} samples found {} waves",
        report.samples,
        report.waves.len()
    );
    Ok(Json(report))
}

fn request_config(base: &WaveConfig, request: &DetectRequest) -> Result<WaveConfig, AppError> {
    let config = WaveConfig {
        min_amplitude: request.min_amplitude.unwrap_or(base.min_amplitude),
        window_minutes: request.window_minutes.unwrap_or(base.window_minutes),
        ..base.clone()
    };
    config
        .validate()
        .map_err(|err| AppError::Validation(err.to_string()))?;
    Ok(config)
}

fn snapshot_event(snapshot: WaveSnapshot) -> Option<Event> {
    let data = serde_json::to_string(&snapshot).ok()?;
    Some(
        Event::default()
            .event("snapshot")
            .id(snapshot.as_of_ms.to_string())
            .data(data),
    )
}
