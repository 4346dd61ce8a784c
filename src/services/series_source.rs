use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;

use crate::business_logic::config::SourceConfig;
use crate::models::sample::{parse_jsonl, SeriesLoad};

/// Daily log name used by the collector
pub fn day_file_name(day: NaiveDate) -> String {
    format!("coin_change_{}.jsonl", day.format("%Y%m%d"))
}

/// Reads the collector's daily JSONL logs
#[derive(Clone)]
pub enum SeriesSource {
    Directory(PathBuf),
    Http {
        client: reqwest::Client,
        base_url: String,
    },
}

impl SeriesSource {
    pub fn new(config: &SourceConfig) -> Self {
        match config {
            SourceConfig::Directory(dir) => SeriesSource::Directory(dir.clone()),
            SourceConfig::Http(base_url) => SeriesSource::Http {
                client: reqwest::Client::new(),
                base_url: base_url.clone(),
            },
        }
    }

    /// Fetch the raw log for a day; a missing day is an empty log
    pub async fn fetch_day_text(&self, day: NaiveDate) -> anyhow::Result<String> {
        let file_name = day_file_name(day);

        match self {
            SeriesSource::Directory(dir) => {
                let path = dir.join(&file_name);
                match tokio::fs::read_to_string(&path).await {
                    Ok(text) => Ok(text),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        tracing::debug!("Series file not found: {}", path.display());
                        Ok(String::new())
                    }
                    Err(e) => {
                        Err(e).with_context(|| format!("failed to read {}", path.display()))
                    }
                }
            }
            SeriesSource::Http { client, base_url } => {
                let url = format!("{}/{}", base_url, file_name);
                let response = client
                    .get(&url)
                    .send()
                    .await
                    .with_context(|| format!("failed to fetch {}", url))?;

                if response.status() == reqwest::StatusCode::NOT_FOUND {
                    tracing::debug!("Series file not found: {}", url);
                    return Ok(String::new());
                }

                response
                    .error_for_status()
                    .with_context(|| format!("series fetch rejected: {}", url))?
                    .text()
                    .await
                    .context("failed to read series body")
            }
        }
    }

    /// Snapshot of the day's series with malformed lines dropped
    pub async fn load_day(&self, day: NaiveDate) -> anyhow::Result<SeriesLoad> {
        let text = self.fetch_day_text(day).await?;
        Ok(parse_jsonl(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "wavescreener-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn day_file_name_uses_compact_date() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(day_file_name(day), "coin_change_20240307.jsonl");
    }

    #[tokio::test]
    async fn directory_source_reads_day_file() {
        let dir = temp_dir("read");
        let day = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        std::fs::write(
            dir.join(day_file_name(day)),
            "{\"timestamp\": 1000, \"total_change\": 1.5}\n{\"timestamp\": 2000, \"total_change\": 2.5}\n",
        )
        .unwrap();

        let source = SeriesSource::new(&SourceConfig::Directory(dir.clone()));
        let load = source.load_day(day).await.unwrap();

        assert_eq!(load.series.len(), 2);
        assert_eq!(load.skipped, 0);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn missing_day_is_empty() {
        let dir = temp_dir("missing");
        let source = SeriesSource::new(&SourceConfig::Directory(dir.clone()));
        let day = NaiveDate::from_ymd_opt(1999, 1, 1).unwrap();

        let load = source.load_day(day).await.unwrap();
        assert!(load.series.is_empty());
        std::fs::remove_dir_all(dir).unwrap();
    }
}
