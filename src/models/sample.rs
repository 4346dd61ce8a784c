use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One observation of the aggregate change metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Sample {
    /// Position in the accepted series (0-based, contiguous)
    pub index: usize,
    #[schema(value_type = String)]
    pub timestamp: DateTime<Utc>,
    /// Cumulative % change summed across the basket
    pub value: f64,
}

/// Raw record as written by the collector, one JSON object per line
#[derive(Debug, Clone, Deserialize)]
pub struct SeriesRecord {
    pub timestamp: Option<RecordTimestamp>,
    pub total_change: Option<f64>,
    pub cumulative_pct: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RecordTimestamp {
    Millis(i64),
    Text(String),
}

impl RecordTimestamp {
    fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            RecordTimestamp::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            RecordTimestamp::Text(text) => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

impl SeriesRecord {
    fn into_point(self) -> Result<(DateTime<Utc>, f64), &'static str> {
        let timestamp = self
            .timestamp
            .as_ref()
            .ok_or("missing timestamp")?
            .to_utc()
            .ok_or("unparseable timestamp")?;
        let value = self
            .total_change
            .or(self.cumulative_pct)
            .ok_or("missing value")?;
        Ok((timestamp, value))
    }
}

/// A record that broke the caller's monotonic-timestamp contract
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityIssue {
    OutOfOrder {
        /// 1-based line (or position) of the offending record
        line: usize,
        #[schema(value_type = String)]
        timestamp: DateTime<Utc>,
        #[schema(value_type = String)]
        previous: DateTime<Utc>,
    },
}

/// Immutable, strictly time-ordered view of the metric
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    samples: Vec<Sample>,
}

impl Series {
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }
}

/// Outcome of loading a series: accepted samples plus what was dropped
#[derive(Debug, Clone, Default)]
pub struct SeriesLoad {
    pub series: Series,
    pub skipped: usize,
    pub issues: Vec<DataQualityIssue>,
}

impl SeriesLoad {
    fn accept(&mut self, line: usize, timestamp: DateTime<Utc>, value: f64) {
        if !value.is_finite() {
            tracing::warn!("Skipping record {}: non-finite value {}", line, value);
            self.skipped += 1;
            return;
        }

        if let Some(previous) = self.series.last().map(|s| s.timestamp) {
            if timestamp <= previous {
                tracing::warn!(
                    "Skipping record {}: timestamp {} not after {}",
                    line,
                    timestamp,
                    previous
                );
                self.skipped += 1;
                self.issues.push(DataQualityIssue::OutOfOrder {
                    line,
                    timestamp,
                    previous,
                });
                return;
            }
        }

        let index = self.series.len();
        self.series.samples.push(Sample {
            index,
            timestamp,
            value,
        });
    }
}

/// Parse a JSONL log, skipping malformed and out-of-order records
pub fn parse_jsonl(text: &str) -> SeriesLoad {
    let mut load = SeriesLoad::default();

    for (line_idx, line) in text.lines().enumerate() {
        let line_no = line_idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        let point = serde_json::from_str::<SeriesRecord>(line)
            .map_err(|e| e.to_string())
            .and_then(|record| record.into_point().map_err(str::to_string));

        match point {
            Ok((timestamp, value)) => load.accept(line_no, timestamp, value),
            Err(reason) => {
                tracing::warn!("Skipping malformed record {}: {}", line_no, reason);
                load.skipped += 1;
            }
        }
    }

    load
}

/// Build a series from in-memory points with the same acceptance rules
pub fn from_points<I>(points: I) -> SeriesLoad
where
    I: IntoIterator<Item = (DateTime<Utc>, f64)>,
{
    let mut load = SeriesLoad::default();
    for (pos, (timestamp, value)) in points.into_iter().enumerate() {
        load.accept(pos + 1, timestamp, value);
    }
    load
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_collector_records() {
        let text = r#"{"timestamp": 1700000000000, "beijing_time": "2023-11-15 06:13:20", "cumulative_pct": -1.5, "total_change": -1.5, "up_ratio": 40.0}
{"timestamp": 1700000060000, "total_change": 2.25}
{"timestamp": "2023-11-14T22:15:20Z", "cumulative_pct": 3.0}
"#;
        let load = parse_jsonl(text);

        assert_eq!(load.skipped, 0);
        assert_eq!(load.series.len(), 3);
        let values: Vec<f64> = load.series.samples().iter().map(|s| s.value).collect();
        assert_eq!(values, vec![-1.5, 2.25, 3.0]);
        let indices: Vec<usize> = load.series.samples().iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn total_change_wins_over_cumulative_pct() {
        let load = parse_jsonl(r#"{"timestamp": 1, "total_change": 1.0, "cumulative_pct": 9.0}"#);
        assert_eq!(load.series.samples()[0].value, 1.0);
    }

    #[test]
    fn skips_malformed_records_and_keeps_indices_contiguous() {
        let text = r#"{"timestamp": 1000, "total_change": 1.0}
not json at all
{"timestamp": 2000}
{"total_change": 4.0}
{"timestamp": "yesterday", "total_change": 4.0}

{"timestamp": 3000, "total_change": 2.0}
"#;
        let load = parse_jsonl(text);

        assert_eq!(load.skipped, 4);
        assert!(load.issues.is_empty());
        assert_eq!(load.series.len(), 2);
        assert_eq!(load.series.samples()[1].index, 1);
        assert_eq!(load.series.samples()[1].value, 2.0);
    }

    #[test]
    fn out_of_order_records_are_reported() {
        let text = r#"{"timestamp": 1000, "total_change": 1.0}
{"timestamp": 3000, "total_change": 2.0}
{"timestamp": 2000, "total_change": 3.0}
{"timestamp": 3000, "total_change": 4.0}
{"timestamp": 4000, "total_change": 5.0}
"#;
        let load = parse_jsonl(text);

        assert_eq!(load.series.len(), 3);
        assert_eq!(load.skipped, 2);
        assert_eq!(load.issues.len(), 2);
        match &load.issues[0] {
            DataQualityIssue::OutOfOrder { line, .. } => assert_eq!(*line, 3),
        }
    }

    #[test]
    fn from_points_rejects_non_finite_values() {
        let t0 = Utc.timestamp_millis_opt(0).unwrap();
        let t1 = Utc.timestamp_millis_opt(60_000).unwrap();
        let load = from_points(vec![(t0, f64::NAN), (t1, 1.0)]);

        assert_eq!(load.skipped, 1);
        assert_eq!(load.series.len(), 1);
        assert_eq!(load.series.samples()[0].index, 0);
    }
}
