use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::sample::{DataQualityIssue, Sample};

/// Reference to a B, A or C point in the series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct ExtremumPoint {
    pub index: usize,
    #[schema(value_type = String)]
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl From<&Sample> for ExtremumPoint {
    fn from(sample: &Sample) -> Self {
        Self {
            index: sample.index,
            timestamp: sample.timestamp,
            value: sample.value,
        }
    }
}

/// A completed B -> A -> C wave
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WavePeak {
    pub b: ExtremumPoint,
    pub a: ExtremumPoint,
    pub c: ExtremumPoint,
    /// a - b
    pub amplitude: f64,
    /// a - c
    pub decline: f64,
    /// decline as % of amplitude
    pub decline_ratio: f64,
}

impl WavePeak {
    pub fn new(b: ExtremumPoint, a: ExtremumPoint, c: ExtremumPoint) -> Self {
        let amplitude = a.value - b.value;
        let decline = a.value - c.value;
        Self {
            b,
            a,
            c,
            amplitude,
            decline,
            decline_ratio: decline / amplitude * 100.0,
        }
    }
}

/// Coarse view of the detector state, without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectionPhase {
    SeekingB,
    ConfirmingB,
    SeekingA,
    ConfirmingA,
    SeekingC,
}

impl From<DetectionPhase> for String {
    fn from(phase: DetectionPhase) -> Self {
        match phase {
            DetectionPhase::SeekingB => "SEEKING_B".to_string(),
            DetectionPhase::ConfirmingB => "CONFIRMING_B".to_string(),
            DetectionPhase::SeekingA => "SEEKING_A".to_string(),
            DetectionPhase::ConfirmingA => "CONFIRMING_A".to_string(),
            DetectionPhase::SeekingC => "SEEKING_C".to_string(),
        }
    }
}

/// Wave with a confirmed B that has not produced a C yet
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct InProgressWave {
    pub phase: DetectionPhase,
    pub b: ExtremumPoint,
    /// Candidate A while confirming, confirmed A while seeking C
    pub a: Option<ExtremumPoint>,
}

/// Three consecutive waves whose peaks never exceed the first one
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FalseBreakoutSignal {
    pub reference_high: f64,
    #[schema(value_type = Vec<WavePeak>)]
    pub peaks: [WavePeak; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceKind {
    BCandidate { point: ExtremumPoint, seeded: bool },
    BReplaced { point: ExtremumPoint },
    BConfirmed { point: ExtremumPoint },
    ACandidate { point: ExtremumPoint },
    AReplaced { point: ExtremumPoint },
    AConfirmed { point: ExtremumPoint },
    Abandoned { b: ExtremumPoint, a: Option<ExtremumPoint> },
    WaveCompleted { c: ExtremumPoint },
}

/// One state-machine transition, keyed by the cursor that caused it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEvent {
    pub index: usize,
    #[serde(flatten)]
    pub kind: TraceKind,
}

/// Everything a detection run exposes to downstream consumers
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DetectionReport {
    pub label: String,
    /// Accepted samples scanned
    pub samples: usize,
    /// Records dropped while loading
    pub skipped: usize,
    /// True while the series is shorter than 3 confirmation windows
    pub quiescent: bool,
    pub phase: DetectionPhase,
    pub waves: Vec<WavePeak>,
    pub in_progress: Option<InProgressWave>,
    /// C of the latest wave, the next wave's starting B
    pub inherited_b: Option<ExtremumPoint>,
    pub false_breakout: Option<FalseBreakoutSignal>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub data_quality: Vec<DataQualityIssue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[schema(value_type = Vec<Object>)]
    pub trace: Vec<TraceEvent>,
}
