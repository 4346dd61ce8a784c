use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use tokio::time::{interval, Duration};

use crate::business_logic::config::{MonitorConfig, WaveConfig};
use crate::business_logic::false_breakout;
use crate::business_logic::wave_chain::WaveChain;
use crate::models::sample::{DataQualityIssue, Series, SeriesLoad};
use crate::models::status::{WaveSnapshot, WaveStatus};
use crate::models::wave::{DetectionPhase, DetectionReport, FalseBreakoutSignal, WavePeak};
use crate::services::series_source::SeriesSource;
use crate::services::wave_state::SharedWaveState;

/// Alert type
#[derive(Debug, Clone)]
pub enum Alert {
    WaveCompleted {
        label: String,
        wave: WavePeak,
    },
    FalseBreakout {
        label: String,
        signal: FalseBreakoutSignal,
    },
}

/// Chain for the day currently being tracked
struct DayChain {
    day: NaiveDate,
    chain: WaveChain,
    /// Waves already surfaced as alerts
    alerted: usize,
    skipped: usize,
    issues: Vec<DataQualityIssue>,
}

impl DayChain {
    fn new(day: NaiveDate, config: &WaveConfig) -> Self {
        Self {
            day,
            chain: WaveChain::new(day_label(day), config.clone()),
            alerted: 0,
            skipped: 0,
            issues: Vec::new(),
        }
    }

    fn report(&self) -> DetectionReport {
        let mut report = self.chain.report();
        report.skipped = self.skipped;
        report.data_quality = self.issues.clone();
        report
    }
}

/// Monitoring service that runs wave detection over the collector's daily log
pub struct MonitorService {
    source: SeriesSource,
    config: WaveConfig,
    poll_interval: Duration,
    utc_offset_hours: i32,
    current: Option<DayChain>,
    shared_state: SharedWaveState,
}

impl MonitorService {
    pub fn new(
        source: SeriesSource,
        config: WaveConfig,
        monitor_config: &MonitorConfig,
        shared_state: SharedWaveState,
    ) -> Self {
        Self {
            source,
            config,
            poll_interval: Duration::from_secs(monitor_config.poll_interval_secs),
            utc_offset_hours: monitor_config.utc_offset_hours,
            current: None,
            shared_state,
        }
    }

    /// Scan everything already logged today before polling starts
    pub async fn warmup(&mut self) -> anyhow::Result<()> {
        let day = self.day_at(Utc::now());
        tracing::info!("Warming up wave detector for {}", day_label(day));

        let load = self.source.load_day(day).await?;
        if load.series.is_empty() {
            tracing::info!("No samples logged for {} yet", day_label(day));
        }
        let alerts = self.ingest(day, load)?;
        for alert in alerts {
            Self::log_alert(&alert);
        }

        if let Some(current) = &self.current {
            tracing::info!(
                "Warmed up {} with {} samples (phase: {}, waves: {})",
                day_label(current.day),
                current.chain.samples_seen(),
                String::from(current.chain.phase()),
                current.chain.waves().len()
            );
        }

        self.update_shared_state().await;
        Ok(())
    }

    /// Start the monitoring loop
    pub async fn run(&mut self) {
        let mut ticker = interval(self.poll_interval);

        loop {
            ticker.tick().await;

            if let Err(e) = self.poll().await {
                tracing::error!("Error polling series: {:#}", e);
            }

            self.update_shared_state().await;
        }
    }

    async fn poll(&mut self) -> anyhow::Result<()> {
        let day = self.day_at(Utc::now());
        let load = self.source.load_day(day).await?;

        for alert in self.ingest(day, load)? {
            Self::log_alert(&alert);
        }

        Ok(())
    }

    fn day_at(&self, now: DateTime<Utc>) -> NaiveDate {
        (now + ChronoDuration::hours(self.utc_offset_hours as i64)).date_naive()
    }

    /// Feed a fresh snapshot of `day` into the chain, resuming where the last poll stopped
    fn ingest(&mut self, day: NaiveDate, load: SeriesLoad) -> anyhow::Result<Vec<Alert>> {
        let needs_reset = match &self.current {
            Some(current) if current.day != day => {
                tracing::info!("Starting a new wave chain for {}", day_label(day));
                true
            }
            Some(current) if scanned_prefix_changed(&current.chain, &load.series) => {
                tracing::warn!("Series for {} was rewritten, rescanning", day_label(day));
                true
            }
            Some(_) => false,
            None => true,
        };
        if needs_reset {
            self.current = Some(DayChain::new(day, &self.config));
        }

        let config = self.config.clone();
        let Some(current) = self.current.as_mut() else {
            return Ok(Vec::new());
        };

        let seen = current.chain.samples_seen();
        if let Err(e) = current.chain.extend(&load.series.samples()[seen..]) {
            // The log no longer extends what was scanned; rescan it whole
            tracing::warn!("Series for {} was rewritten ({}), rescanning", day_label(day), e);
            *current = DayChain::new(day, &config);
            current.chain.extend(load.series.samples())?;
        }
        current.skipped = load.skipped;
        current.issues = load.issues;

        let mut alerts = Vec::new();
        if current.chain.is_quiescent() || current.alerted == current.chain.waves().len() {
            return Ok(alerts);
        }

        let label = day_label(day);
        for wave in &current.chain.waves()[current.alerted..] {
            alerts.push(Alert::WaveCompleted {
                label: label.clone(),
                wave: wave.clone(),
            });
        }
        current.alerted = current.chain.waves().len();

        if let Some(signal) = false_breakout::evaluate(current.chain.waves()) {
            alerts.push(Alert::FalseBreakout { label, signal });
        }

        Ok(alerts)
    }

    fn status(&self) -> WaveStatus {
        match &self.current {
            Some(current) => {
                let report = current.report();
                WaveStatus {
                    day: Some(day_label(current.day)),
                    is_warmed_up: !report.quiescent,
                    summary: build_summary(&report, self.config.min_samples()),
                    report: Some(report),
                }
            }
            None => WaveStatus::default(),
        }
    }

    async fn update_shared_state(&self) {
        let status = self.status();

        let snapshot = WaveSnapshot {
            as_of_ms: chrono::Utc::now().timestamp_millis() as u64,
            status: status.clone(),
        };

        let mut state = self.shared_state.status.write().await;
        *state = status;
        let _ = self.shared_state.broadcaster.send(snapshot);
    }

    fn log_alert(alert: &Alert) {
        match alert {
            Alert::WaveCompleted { label, wave } => {
                tracing::warn!(
                    "🌊 WAVE [{}]: B {:.2} -> A {:.2} -> C {:.2} (amplitude {:.2}, retraced {:.1}%)",
                    label,
                    wave.b.value,
                    wave.a.value,
                    wave.c.value,
                    wave.amplitude,
                    wave.decline_ratio
                );
            }
            Alert::FalseBreakout { label, signal } => {
                tracing::warn!(
                    "🚨 FALSE BREAKOUT [{}]: peaks {:.2}, {:.2}, {:.2} failed to clear {:.2}",
                    label,
                    signal.peaks[0].a.value,
                    signal.peaks[1].a.value,
                    signal.peaks[2].a.value,
                    signal.reference_high
                );
            }
        }
    }
}

/// The sample the chain last scanned is gone or differs in the new snapshot
fn scanned_prefix_changed(chain: &WaveChain, series: &Series) -> bool {
    match series.samples().get(..chain.samples_seen()) {
        Some(prefix) => prefix.last() != chain.last_sample(),
        None => true,
    }
}

fn day_label(day: NaiveDate) -> String {
    day.format("%Y%m%d").to_string()
}

fn build_summary(report: &DetectionReport, min_samples: usize) -> String {
    let label = &report.label;

    if report.quiescent {
        return format!(
            "{label}: warming up, {} of {} samples collected.",
            report.samples, min_samples
        );
    }

    if let Some(signal) = &report.false_breakout {
        return format!(
            "{label}: false breakout, last three peaks stayed at or below {}.",
            format_value(signal.reference_high)
        );
    }

    let waves = report.waves.len();
    match (&report.in_progress, report.phase) {
        (Some(wave), DetectionPhase::SeekingC) => match wave.a {
            Some(a) => format!(
                "{label}: {waves} waves; peak {} confirmed above base {}, waiting for retracement.",
                format_value(a.value),
                format_value(wave.b.value)
            ),
            None => format!("{label}: {waves} waves; waiting for retracement."),
        },
        (Some(wave), DetectionPhase::ConfirmingA) => match wave.a {
            Some(a) => format!(
                "{label}: {waves} waves; confirming peak {} above base {}.",
                format_value(a.value),
                format_value(wave.b.value)
            ),
            None => format!("{label}: {waves} waves; confirming peak."),
        },
        (Some(wave), _) => format!(
            "{label}: {waves} waves; base {} confirmed, watching for a rise.",
            format_value(wave.b.value)
        ),
        (None, DetectionPhase::ConfirmingB) => {
            format!("{label}: {waves} waves; confirming a new base.")
        }
        (None, _) => format!("{label}: {waves} waves; watching for a new base."),
    }
}

fn format_value(value: f64) -> String {
    format!("{:.2}%", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::business_logic::config::SourceConfig;
    use crate::models::sample::from_points;
    use crate::services::wave_state::new_shared_state;
    use chrono::TimeZone;

    fn make_service() -> MonitorService {
        let monitor_config = MonitorConfig {
            source: SourceConfig::Directory(std::env::temp_dir()),
            ..MonitorConfig::default()
        };
        let config = WaveConfig {
            min_amplitude: 35.0,
            window_minutes: 3,
            abandon_tolerance: 0.0,
        };
        MonitorService::new(
            SeriesSource::new(&monitor_config.source),
            config,
            &monitor_config,
            new_shared_state(),
        )
    }

    fn make_load(values: &[f64]) -> SeriesLoad {
        from_points(values.iter().enumerate().map(|(i, &v)| {
            (
                Utc.timestamp_millis_opt(1_700_000_000_000 + i as i64 * 60_000)
                    .unwrap(),
                v,
            )
        }))
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    const SINGLE_WAVE: [f64; 22] = [
        0.0, -2.0, -5.0, -3.0, 0.0, 5.0, 10.0, 15.0, 20.0, 25.0, 30.0, 35.0, 40.0, 45.0, 44.0,
        40.0, 30.0, 25.0, 18.0, 15.0, 17.0, 20.0,
    ];

    #[test]
    fn day_uses_configured_offset() {
        let service = make_service();
        // 20:00 UTC is already the next day at UTC+8
        let now = Utc.with_ymd_and_hms(2024, 3, 6, 20, 0, 0).unwrap();
        assert_eq!(service.day_at(now), day(7));
    }

    #[test]
    fn wave_alerts_fire_once_as_the_log_grows() {
        let mut service = make_service();

        let alerts = service.ingest(day(7), make_load(&SINGLE_WAVE[..18])).unwrap();
        assert!(alerts.is_empty());

        let alerts = service.ingest(day(7), make_load(&SINGLE_WAVE)).unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(matches!(
            &alerts[0],
            Alert::WaveCompleted { wave, .. } if wave.c.value == 15.0
        ));

        let alerts = service.ingest(day(7), make_load(&SINGLE_WAVE)).unwrap();
        assert!(alerts.is_empty());
    }

    #[test]
    fn new_day_starts_a_fresh_chain() {
        let mut service = make_service();
        service.ingest(day(7), make_load(&SINGLE_WAVE)).unwrap();
        assert_eq!(service.status().report.unwrap().waves.len(), 1);

        service.ingest(day(8), make_load(&SINGLE_WAVE[..5])).unwrap();
        let status = service.status();
        assert_eq!(status.day.as_deref(), Some("20240308"));
        assert!(!status.is_warmed_up);
        assert_eq!(status.report.unwrap().samples, 5);
    }

    #[test]
    fn shrunken_log_is_rescanned() {
        let mut service = make_service();
        service.ingest(day(7), make_load(&SINGLE_WAVE)).unwrap();

        service.ingest(day(7), make_load(&SINGLE_WAVE[..12])).unwrap();
        let report = service.status().report.unwrap();
        assert_eq!(report.samples, 12);
        assert!(report.waves.is_empty());
    }

    #[test]
    fn log_rewritten_in_place_is_rescanned() {
        let mut service = make_service();
        service.ingest(day(7), make_load(&SINGLE_WAVE)).unwrap();
        assert_eq!(service.status().report.unwrap().waves.len(), 1);

        // same length, different values
        let alerts = service.ingest(day(7), make_load(&[1.0; 22])).unwrap();
        assert!(alerts.is_empty());
        let report = service.status().report.unwrap();
        assert_eq!(report.samples, 22);
        assert!(report.waves.is_empty());
    }

    #[test]
    fn log_rewritten_and_grown_is_rescanned() {
        let mut service = make_service();
        service.ingest(day(7), make_load(&SINGLE_WAVE[..20])).unwrap();

        let mut rewritten = vec![1.0; 20];
        rewritten.extend([2.0, 3.0, 4.0]);
        service.ingest(day(7), make_load(&rewritten)).unwrap();

        let report = service.status().report.unwrap();
        assert_eq!(report.samples, 23);
        assert!(report.in_progress.is_none());
    }

    #[test]
    fn summary_reports_warmup_and_retracement() {
        let mut service = make_service();
        service.ingest(day(7), make_load(&SINGLE_WAVE[..4])).unwrap();
        assert!(service.status().summary.contains("warming up, 4 of 9"));

        service.ingest(day(7), make_load(&SINGLE_WAVE[..19])).unwrap();
        let summary = service.status().summary;
        assert!(summary.contains("peak 45.00% confirmed"), "{}", summary);
    }
}
