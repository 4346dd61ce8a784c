use crate::business_logic::config::WaveConfig;
use crate::business_logic::confirmation::{is_confirmed, ExtremumRole};
use crate::business_logic::false_breakout;
use crate::business_logic::wave_detector::WaveDetector;
use crate::errors::SeriesError;
use crate::models::sample::{Sample, SeriesLoad};
use crate::models::wave::{DetectionPhase, DetectionReport, ExtremumPoint, WavePeak};

/// Completed waves of one series plus the detector that resumes it
#[derive(Debug, Clone)]
pub struct WaveChain {
    detector: WaveDetector,
    waves: Vec<WavePeak>,
    samples_seen: usize,
    last: Option<Sample>,
}

impl WaveChain {
    pub fn new(label: String, config: WaveConfig) -> Self {
        Self::from_detector(WaveDetector::new(label, config))
    }

    pub fn with_trace(label: String, config: WaveConfig) -> Self {
        Self::from_detector(WaveDetector::new(label, config).with_trace())
    }

    fn from_detector(detector: WaveDetector) -> Self {
        Self {
            detector,
            waves: Vec::new(),
            samples_seen: 0,
            last: None,
        }
    }

    /// Feed samples that follow the ones already seen.
    /// Returns the waves completed by this batch.
    pub fn extend(&mut self, samples: &[Sample]) -> Result<Vec<WavePeak>, SeriesError> {
        let mut completed = Vec::new();

        for sample in samples {
            if sample.index != self.samples_seen {
                return Err(SeriesError::IndexGap {
                    expected: self.samples_seen,
                    actual: sample.index,
                });
            }
            if let Some(previous) = self.last.map(|last| last.timestamp) {
                if sample.timestamp <= previous {
                    return Err(SeriesError::OutOfOrder {
                        index: sample.index,
                        timestamp: sample.timestamp,
                        previous,
                    });
                }
            }

            self.samples_seen += 1;
            self.last = Some(*sample);

            if let Some(wave) = self.detector.step(sample) {
                self.waves.push(wave.clone());
                completed.push(wave);
            }
        }

        Ok(completed)
    }

    pub fn waves(&self) -> &[WavePeak] {
        &self.waves
    }

    pub fn samples_seen(&self) -> usize {
        self.samples_seen
    }

    /// Most recent sample fed to the detector
    pub fn last_sample(&self) -> Option<&Sample> {
        self.last.as_ref()
    }

    pub fn phase(&self) -> DetectionPhase {
        self.detector.state().phase()
    }

    /// C of the latest wave, which anchors the next wave's B
    pub fn inherited_b(&self) -> Option<ExtremumPoint> {
        self.waves.last().map(|wave| wave.c)
    }

    /// Too few samples for a meaningful scan
    pub fn is_quiescent(&self) -> bool {
        self.samples_seen < self.detector.config().min_samples()
    }

    pub fn report(&self) -> DetectionReport {
        let quiescent = self.is_quiescent();
        let (waves, in_progress, inherited_b, false_breakout) = if quiescent {
            (Vec::new(), None, None, None)
        } else {
            (
                self.waves.clone(),
                self.detector.in_progress(),
                self.inherited_b(),
                false_breakout::evaluate(&self.waves),
            )
        };

        DetectionReport {
            label: self.detector.label().to_string(),
            samples: self.samples_seen,
            skipped: 0,
            quiescent,
            phase: self.phase(),
            waves,
            in_progress,
            inherited_b,
            false_breakout,
            data_quality: Vec::new(),
            trace: self.detector.trace().to_vec(),
        }
    }
}

/// Scan a loaded series from scratch
pub fn detect(
    label: &str,
    load: &SeriesLoad,
    config: &WaveConfig,
    trace: bool,
) -> Result<DetectionReport, SeriesError> {
    let mut chain = if trace {
        WaveChain::with_trace(label.to_string(), config.clone())
    } else {
        WaveChain::new(label.to_string(), config.clone())
    };
    chain.extend(load.series.samples())?;
    debug_assert!(
        extrema_confirmed(load.series.samples(), chain.waves(), config.window_minutes),
        "emitted wave with an unconfirmed B or A"
    );

    let mut report = chain.report();
    report.skipped = load.skipped;
    report.data_quality = load.issues.clone();
    Ok(report)
}

/// Every B held as the low and every A as the high for a full window
fn extrema_confirmed(samples: &[Sample], waves: &[WavePeak], window: usize) -> bool {
    waves.iter().all(|wave| {
        is_confirmed(samples, wave.b.index, ExtremumRole::Minimum, window)
            && is_confirmed(samples, wave.a.index, ExtremumRole::Maximum, window)
    })
}
