use crate::business_logic::config::WaveConfig;
use crate::business_logic::confirmation::{Candidate, ExtremumRole, Observation};
use crate::models::sample::Sample;
use crate::models::wave::{
    DetectionPhase, ExtremumPoint, InProgressWave, TraceEvent, TraceKind, WavePeak,
};

/// Wave detection state, one active per cursor position
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionState {
    /// Looking for a B candidate; `seed` is taken as the candidate on the next sample
    SeekingB { seed: Option<ExtremumPoint> },
    /// B candidate must survive the window without a lower sample
    ConfirmingB { b: Candidate },
    /// B confirmed, waiting for a sample high enough to be A
    SeekingA { b: ExtremumPoint },
    /// A candidate must survive the window without a higher sample;
    /// a retracement seen meanwhile is held until A confirms
    ConfirmingA {
        b: ExtremumPoint,
        a: Candidate,
        early_c: Option<EarlyRetracement>,
    },
    /// A confirmed, waiting for the retracement and upturn that marks C
    SeekingC { b: ExtremumPoint, a: ExtremumPoint },
}

impl DetectionState {
    pub fn phase(&self) -> DetectionPhase {
        match self {
            DetectionState::SeekingB { .. } => DetectionPhase::SeekingB,
            DetectionState::ConfirmingB { .. } => DetectionPhase::ConfirmingB,
            DetectionState::SeekingA { .. } => DetectionPhase::SeekingA,
            DetectionState::ConfirmingA { .. } => DetectionPhase::ConfirmingA,
            DetectionState::SeekingC { .. } => DetectionPhase::SeekingC,
        }
    }
}

impl Default for DetectionState {
    fn default() -> Self {
        DetectionState::SeekingB { seed: None }
    }
}

/// C found inside A's confirmation window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EarlyRetracement {
    pub c: ExtremumPoint,
    /// Next B, seeded with C and tracked from the sample after it
    pub next_b: Candidate,
}

/// Whether the handler finished with the current sample
enum Flow {
    Consumed,
    Reprocess,
}

/// Single-pass B -> A -> C detector over one series
#[derive(Debug, Clone)]
pub struct WaveDetector {
    label: String,
    config: WaveConfig,
    state: DetectionState,
    prev: Option<Sample>,
    trace: Option<Vec<TraceEvent>>,
}

impl WaveDetector {
    pub fn new(label: String, config: WaveConfig) -> Self {
        Self {
            label,
            config,
            state: DetectionState::default(),
            prev: None,
            trace: None,
        }
    }

    /// Record every transition as a [`TraceEvent`]
    pub fn with_trace(mut self) -> Self {
        self.trace = Some(Vec::new());
        self
    }

    /// Advance the cursor by one sample.
    /// Returns the wave completed by this sample, if any.
    pub fn step(&mut self, sample: &Sample) -> Option<WavePeak> {
        let prev = self.prev.replace(*sample);
        let mut completed = None;

        loop {
            let state = std::mem::take(&mut self.state);
            let (next, flow) = self.transition(state, prev.as_ref(), sample, &mut completed);
            self.state = next;
            if let Flow::Consumed = flow {
                break;
            }
        }

        completed
    }

    fn transition(
        &mut self,
        state: DetectionState,
        prev: Option<&Sample>,
        sample: &Sample,
        completed: &mut Option<WavePeak>,
    ) -> (DetectionState, Flow) {
        let window = self.config.window_minutes;

        match state {
            DetectionState::SeekingB { seed: Some(seed) } => {
                self.record(sample.index, TraceKind::BCandidate { point: seed, seeded: true });
                tracing::debug!(
                    "[{}] B candidate {} seeded at {} (cursor {})",
                    self.label,
                    seed.value,
                    seed.index,
                    sample.index
                );
                let b = Candidate::open(seed, sample.index);
                (DetectionState::ConfirmingB { b }, Flow::Reprocess)
            }
            DetectionState::SeekingB { seed: None } => match prev {
                Some(prev) if sample.value < prev.value => {
                    let point = ExtremumPoint::from(sample);
                    self.record(sample.index, TraceKind::BCandidate { point, seeded: false });
                    let b = Candidate::open(point, sample.index);
                    (DetectionState::ConfirmingB { b }, Flow::Consumed)
                }
                _ => (DetectionState::SeekingB { seed: None }, Flow::Consumed),
            },
            DetectionState::ConfirmingB { mut b } => {
                match b.observe(ExtremumRole::Minimum, sample, window) {
                    Observation::Replaced => {
                        self.record(sample.index, TraceKind::BReplaced { point: b.point });
                        (DetectionState::ConfirmingB { b }, Flow::Consumed)
                    }
                    Observation::Pending => (DetectionState::ConfirmingB { b }, Flow::Consumed),
                    Observation::Confirmed => {
                        self.record(sample.index, TraceKind::BConfirmed { point: b.point });
                        tracing::debug!(
                            "[{}] B confirmed at {} (index {})",
                            self.label,
                            b.point.value,
                            b.point.index
                        );
                        (DetectionState::SeekingA { b: b.point }, Flow::Consumed)
                    }
                }
            }
            DetectionState::SeekingA { b } => {
                if self.breaches(&b, sample) {
                    return (self.abandon(b, None, sample), Flow::Consumed);
                }

                if sample.value - b.value >= self.config.min_amplitude {
                    let point = ExtremumPoint::from(sample);
                    self.record(sample.index, TraceKind::ACandidate { point });
                    let a = Candidate::open(point, sample.index);
                    (
                        DetectionState::ConfirmingA {
                            b,
                            a,
                            early_c: None,
                        },
                        Flow::Consumed,
                    )
                } else {
                    (DetectionState::SeekingA { b }, Flow::Consumed)
                }
            }
            DetectionState::ConfirmingA { b, mut a, early_c } => {
                if self.breaches(&b, sample) {
                    return (self.abandon(b, Some(a.point), sample), Flow::Consumed);
                }

                // A higher sample always keeps the amplitude above the threshold
                let observation = a.observe(ExtremumRole::Maximum, sample, window);
                if observation == Observation::Replaced {
                    self.record(sample.index, TraceKind::AReplaced { point: a.point });
                    let early_c = None;
                    return (DetectionState::ConfirmingA { b, a, early_c }, Flow::Consumed);
                }

                let early_c = match early_c {
                    Some(mut early) => {
                        early.next_b.observe(ExtremumRole::Minimum, sample, window);
                        Some(early)
                    }
                    None => retracement(&b, &a.point, prev, sample).map(|c| EarlyRetracement {
                        c,
                        next_b: Candidate::open(c, sample.index),
                    }),
                };

                if observation == Observation::Pending {
                    return (DetectionState::ConfirmingA { b, a, early_c }, Flow::Consumed);
                }

                self.record(sample.index, TraceKind::AConfirmed { point: a.point });
                tracing::debug!(
                    "[{}] A confirmed at {} (index {}, amplitude {:.2})",
                    self.label,
                    a.point.value,
                    a.point.index,
                    a.point.value - b.value
                );

                match early_c {
                    Some(early) => {
                        *completed = Some(self.complete(b, a.point, early.c, sample.index));
                        self.record(
                            sample.index,
                            TraceKind::BCandidate {
                                point: early.c,
                                seeded: true,
                            },
                        );
                        if early.next_b.point != early.c {
                            self.record(
                                sample.index,
                                TraceKind::BReplaced {
                                    point: early.next_b.point,
                                },
                            );
                        }
                        let b = early.next_b;
                        (DetectionState::ConfirmingB { b }, Flow::Reprocess)
                    }
                    None => (DetectionState::SeekingC { b, a: a.point }, Flow::Consumed),
                }
            }
            DetectionState::SeekingC { b, a } => {
                if let Some(c) = retracement(&b, &a, prev, sample) {
                    *completed = Some(self.complete(b, a, c, sample.index));
                    return (DetectionState::SeekingB { seed: Some(c) }, Flow::Reprocess);
                }

                if sample.value > a.value {
                    // A new high before C forms replaces the peak
                    tracing::debug!(
                        "[{}] A {} superseded by {} (index {})",
                        self.label,
                        a.value,
                        sample.value,
                        sample.index
                    );
                    let a = Candidate::open(ExtremumPoint::from(sample), sample.index);
                    self.record(sample.index, TraceKind::AReplaced { point: a.point });
                    let early_c = None;
                    return (DetectionState::ConfirmingA { b, a, early_c }, Flow::Consumed);
                }

                (DetectionState::SeekingC { b, a }, Flow::Consumed)
            }
        }
    }

    fn complete(
        &mut self,
        b: ExtremumPoint,
        a: ExtremumPoint,
        c: ExtremumPoint,
        cursor: usize,
    ) -> WavePeak {
        let wave = WavePeak::new(b, a, c);
        self.record(cursor, TraceKind::WaveCompleted { c });
        tracing::debug!(
            "[{}] Wave completed: B {} -> A {} -> C {} ({:.1}% retraced)",
            self.label,
            b.value,
            a.value,
            c.value,
            wave.decline_ratio
        );
        wave
    }

    fn breaches(&self, b: &ExtremumPoint, sample: &Sample) -> bool {
        sample.value < b.value - self.config.abandon_tolerance
    }

    fn abandon(
        &mut self,
        b: ExtremumPoint,
        a: Option<ExtremumPoint>,
        sample: &Sample,
    ) -> DetectionState {
        self.record(sample.index, TraceKind::Abandoned { b, a });
        tracing::debug!(
            "[{}] B {} abandoned: {} dipped below it (index {})",
            self.label,
            b.value,
            sample.value,
            sample.index
        );
        DetectionState::SeekingB {
            seed: Some(ExtremumPoint::from(sample)),
        }
    }

    fn record(&mut self, index: usize, kind: TraceKind) {
        if let Some(trace) = self.trace.as_mut() {
            trace.push(TraceEvent { index, kind });
        }
    }

    pub fn state(&self) -> &DetectionState {
        &self.state
    }

    pub fn config(&self) -> &WaveConfig {
        &self.config
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Partial wave once B is confirmed
    pub fn in_progress(&self) -> Option<InProgressWave> {
        let phase = self.state.phase();
        match &self.state {
            DetectionState::SeekingA { b } => Some(InProgressWave { phase, b: *b, a: None }),
            DetectionState::ConfirmingA { b, a, .. } => Some(InProgressWave {
                phase,
                b: *b,
                a: Some(a.point),
            }),
            DetectionState::SeekingC { b, a } => Some(InProgressWave {
                phase,
                b: *b,
                a: Some(*a),
            }),
            DetectionState::SeekingB { .. } | DetectionState::ConfirmingB { .. } => None,
        }
    }

    pub fn trace(&self) -> &[TraceEvent] {
        self.trace.as_deref().unwrap_or(&[])
    }
}

/// C is the sample before `sample` when it sits past A, at or below the
/// half-amplitude target, and `sample` turns up from it
fn retracement(
    b: &ExtremumPoint,
    a: &ExtremumPoint,
    prev: Option<&Sample>,
    sample: &Sample,
) -> Option<ExtremumPoint> {
    let prev = prev?;
    let target = a.value - (a.value - b.value) / 2.0;
    (prev.index > a.index && prev.value <= target && sample.value > prev.value)
        .then(|| ExtremumPoint::from(prev))
}
