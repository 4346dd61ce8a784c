use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// Day file the monitor is tracking, if it has polled yet
    pub tracking_day: Option<String>,
    pub samples_seen: usize,
}
