use serde::Serialize;

use crate::models::sample::Sample;
use crate::models::wave::ExtremumPoint;

/// Which side of the candidate a later sample must not cross
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtremumRole {
    Minimum,
    Maximum,
}

impl ExtremumRole {
    /// Strictly beyond the candidate in the role's direction
    pub fn violated_by(self, candidate: f64, value: f64) -> bool {
        match self {
            ExtremumRole::Minimum => value < candidate,
            ExtremumRole::Maximum => value > candidate,
        }
    }
}

/// Result of looking forward from a candidate over a finished series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Violated { at: usize },
    /// Fewer than `window` samples exist after the candidate
    Pending { observed: usize },
}

/// Scan `(i, i + window]` for a sample that violates the candidate at `i`
pub fn check_confirmation(
    samples: &[Sample],
    i: usize,
    role: ExtremumRole,
    window: usize,
) -> Confirmation {
    let Some(candidate) = samples.get(i) else {
        return Confirmation::Pending { observed: 0 };
    };

    let end = (i + window).min(samples.len().saturating_sub(1));
    for sample in samples.iter().take(end + 1).skip(i + 1) {
        if role.violated_by(candidate.value, sample.value) {
            return Confirmation::Violated { at: sample.index };
        }
    }

    let observed = end - i;
    if observed < window {
        Confirmation::Pending { observed }
    } else {
        Confirmation::Confirmed
    }
}

pub fn is_confirmed(samples: &[Sample], i: usize, role: ExtremumRole, window: usize) -> bool {
    check_confirmation(samples, i, role, window) == Confirmation::Confirmed
}

/// A candidate point and the cursor its confirmation window opened at
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candidate {
    pub point: ExtremumPoint,
    pub since: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The sample beat the candidate and took its place
    Replaced,
    Pending,
    Confirmed,
}

impl Candidate {
    pub fn open(point: ExtremumPoint, since: usize) -> Self {
        Self { point, since }
    }

    /// Feed the sample at the cursor into the window
    pub fn observe(&mut self, role: ExtremumRole, sample: &Sample, window: usize) -> Observation {
        if role.violated_by(self.point.value, sample.value) {
            *self = Self::open(ExtremumPoint::from(sample), sample.index);
            return Observation::Replaced;
        }

        if sample.index.saturating_sub(self.since) >= window {
            Observation::Confirmed
        } else {
            Observation::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn series(values: &[f64]) -> Vec<Sample> {
        values
            .iter()
            .enumerate()
            .map(|(index, &value)| Sample {
                index,
                timestamp: Utc.timestamp_millis_opt(index as i64 * 60_000).unwrap(),
                value,
            })
            .collect()
    }

    #[test]
    fn minimum_confirmed_after_full_window() {
        let samples = series(&[0.0, -5.0, -3.0, 0.0, 5.0]);
        assert!(is_confirmed(&samples, 1, ExtremumRole::Minimum, 3));
    }

    #[test]
    fn equal_values_do_not_violate() {
        let samples = series(&[10.0, 10.0, 10.0]);
        assert!(is_confirmed(&samples, 0, ExtremumRole::Maximum, 2));
        assert!(is_confirmed(&samples, 0, ExtremumRole::Minimum, 2));
    }

    #[test]
    fn violation_reports_offending_index() {
        let samples = series(&[0.0, -5.0, -3.0, -6.0, 0.0]);
        assert_eq!(
            check_confirmation(&samples, 1, ExtremumRole::Minimum, 3),
            Confirmation::Violated { at: 3 }
        );
    }

    #[test]
    fn short_tail_is_pending_not_confirmed() {
        let samples = series(&[0.0, 45.0, 44.0]);
        assert_eq!(
            check_confirmation(&samples, 1, ExtremumRole::Maximum, 3),
            Confirmation::Pending { observed: 1 }
        );
        assert!(!is_confirmed(&samples, 1, ExtremumRole::Maximum, 3));
        assert_eq!(
            check_confirmation(&samples, 7, ExtremumRole::Maximum, 3),
            Confirmation::Pending { observed: 0 }
        );
    }

    #[test]
    fn candidate_replaces_and_restarts_window() {
        let samples = series(&[0.0, -2.0, -5.0, -3.0, 0.0, 5.0]);
        let mut candidate = Candidate::open(ExtremumPoint::from(&samples[1]), 1);

        assert_eq!(
            candidate.observe(ExtremumRole::Minimum, &samples[2], 3),
            Observation::Replaced
        );
        assert_eq!(candidate.point.index, 2);
        assert_eq!(candidate.since, 2);

        assert_eq!(
            candidate.observe(ExtremumRole::Minimum, &samples[3], 3),
            Observation::Pending
        );
        assert_eq!(
            candidate.observe(ExtremumRole::Minimum, &samples[4], 3),
            Observation::Pending
        );
        assert_eq!(
            candidate.observe(ExtremumRole::Minimum, &samples[5], 3),
            Observation::Confirmed
        );
    }
}
