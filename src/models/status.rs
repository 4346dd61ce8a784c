use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::wave::DetectionReport;

/// Latest monitor view of the day's series
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WaveStatus {
    /// Day file being tracked, YYYYMMDD
    pub day: Option<String>,
    pub is_warmed_up: bool,
    pub summary: String,
    pub report: Option<DetectionReport>,
}

impl Default for WaveStatus {
    fn default() -> Self {
        Self {
            day: None,
            is_warmed_up: false,
            summary: "waiting for the first poll.".to_string(),
            report: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WaveSnapshot {
    pub as_of_ms: u64,
    pub status: WaveStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SamplePoint {
    #[schema(value_type = String, example = "2024-01-01T00:00:00Z")]
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Ad-hoc detection over a caller-supplied series
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct DetectRequest {
    #[validate(length(min = 1, max = 20000))]
    pub samples: Vec<SamplePoint>,
    /// Defaults to the server's configured amplitude
    #[validate(range(exclusive_min = 0.0))]
    pub min_amplitude: Option<f64>,
    /// Defaults to the server's configured window
    #[validate(range(min = 1, max = 1440))]
    pub window_minutes: Option<usize>,
    /// Attach the transition trace to the report
    #[serde(default)]
    pub trace: bool,
}
