use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context};
use validator::Validate;

/// Configuration parameters for wave detection
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct WaveConfig {
    /// Min rise from B to A; zero would admit flat waves
    #[validate(range(exclusive_min = 0.0))]
    pub min_amplitude: f64,
    /// Samples a candidate must survive before it is confirmed
    #[validate(range(min = 1, max = 1440))]
    pub window_minutes: usize,
    /// How far below B a sample must dip before B is abandoned
    #[validate(range(min = 0.0))]
    pub abandon_tolerance: f64,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            min_amplitude: 35.0,
            window_minutes: 15,
            abandon_tolerance: 0.0,
        }
    }
}

impl WaveConfig {
    /// Defaults overridden by `WAVE_*` environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let config = Self {
            min_amplitude: env_or("WAVE_MIN_AMPLITUDE", defaults.min_amplitude)?,
            window_minutes: env_or("WAVE_WINDOW_MINUTES", defaults.window_minutes)?,
            abandon_tolerance: env_or("WAVE_ABANDON_TOLERANCE", defaults.abandon_tolerance)?,
        };
        config
            .validate()
            .context("invalid wave detection config")?;
        Ok(config)
    }

    /// Shortest series that is not treated as quiescent
    pub fn min_samples(&self) -> usize {
        self.window_minutes.saturating_mul(3)
    }
}

/// Where the daily series logs are read from
#[derive(Debug, Clone, PartialEq)]
pub enum SourceConfig {
    Directory(PathBuf),
    Http(String),
}

/// Configuration for the polling monitor and the HTTP surface
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub source: SourceConfig,
    /// Seconds between polls of the series log
    pub poll_interval_secs: u64,
    pub bind_addr: String,
    /// Offset of the calendar the collector names its daily files in
    pub utc_offset_hours: i32,
    /// Rolling log directory; stdout only when unset
    pub log_dir: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::Directory(PathBuf::from("data/coin_change_tracker")),
            poll_interval_secs: 60,
            bind_addr: "0.0.0.0:3000".to_string(),
            utc_offset_hours: 8,
            log_dir: None,
        }
    }
}

impl MonitorConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let source = match (
            std::env::var("SERIES_BASE_URL").ok(),
            std::env::var("SERIES_DATA_DIR").ok(),
        ) {
            (Some(url), _) => SourceConfig::Http(url.trim_end_matches('/').to_string()),
            (None, Some(dir)) => SourceConfig::Directory(PathBuf::from(dir)),
            (None, None) => defaults.source,
        };

        let poll_interval_secs = env_or("POLL_INTERVAL_SECS", defaults.poll_interval_secs)?;
        if poll_interval_secs == 0 {
            bail!("POLL_INTERVAL_SECS must be positive");
        }

        let utc_offset_hours = env_or("SERIES_UTC_OFFSET_HOURS", defaults.utc_offset_hours)?;
        if !(-12..=14).contains(&utc_offset_hours) {
            bail!("SERIES_UTC_OFFSET_HOURS out of range: {}", utc_offset_hours);
        }

        Ok(Self {
            source,
            poll_interval_secs,
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            utc_offset_hours,
            log_dir: std::env::var("LOG_DIR").ok().map(PathBuf::from),
        })
    }
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("failed to parse {}={:?}", key, raw)),
        Err(_) => Ok(default),
    }
}
