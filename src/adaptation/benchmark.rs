// Weighting benchmark — does the current weighting separate good reviews
// from rejected ones better than uniform weights would?

use serde::Serialize;
use std::collections::BTreeMap;

use crate::audit::{AuditRecord, Outcome};
use crate::critique::{round_to, weighted_composite};

/// Mean composite of favorable vs rejected reviews under one weighting
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeightingSummary {
    pub mean_favorable: Option<f64>,
    pub mean_rejected: Option<f64>,
    /// `mean_favorable - mean_rejected` when both exist
    pub separation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkReport {
    pub window_days: u32,
    /// Records with a final outcome and at least one stored score
    pub records_scored: usize,
    pub current: WeightingSummary,
    pub uniform: WeightingSummary,
}

impl BenchmarkReport {
    /// Separation gained over uniform weighting, if both are defined
    pub fn improvement(&self) -> Option<f64> {
        match (self.current.separation, self.uniform.separation) {
            (Some(current), Some(uniform)) => Some(round_to(current - uniform, 2)),
            _ => None,
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(round_to(values.iter().sum::<f64>() / values.len() as f64, 2))
    }
}

fn summarize(records: &[&AuditRecord], weights: &BTreeMap<String, f64>) -> WeightingSummary {
    let mut favorable = Vec::new();
    let mut rejected = Vec::new();

    for record in records {
        let composite = weighted_composite(
            record.scores.iter().map(|(role, score)| (role.as_str(), *score)),
            weights,
        );
        let Some(composite) = composite else { continue };
        if record.outcome.is_favorable() {
            favorable.push(composite);
        } else if record.outcome == Outcome::Rejected {
            rejected.push(composite);
        }
    }

    let mean_favorable = mean(&favorable);
    let mean_rejected = mean(&rejected);
    let separation = match (mean_favorable, mean_rejected) {
        (Some(f), Some(r)) => Some(round_to(f - r, 2)),
        _ => None,
    };
    WeightingSummary {
        mean_favorable,
        mean_rejected,
        separation,
    }
}

/// Re-score stored per-role scores under `weights` and under uniform weights
pub fn run_benchmark(
    records: &[AuditRecord],
    weights: &BTreeMap<String, f64>,
    window_days: u32,
) -> BenchmarkReport {
    let scored: Vec<&AuditRecord> = records
        .iter()
        .filter(|r| !r.outcome.is_pending() && !r.scores.is_empty())
        .collect();

    BenchmarkReport {
        window_days,
        records_scored: scored.len(),
        current: summarize(&scored, weights),
        uniform: summarize(&scored, &BTreeMap::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(outcome: Outcome, scores: &[(&str, f64)]) -> AuditRecord {
        let mut r = AuditRecord::new("demo", "h");
        r.outcome = outcome;
        r.scores = scores.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        r
    }

    #[test]
    fn test_weighting_that_trusts_the_right_reviewer_separates_more() {
        // security agrees with outcomes, style does not
        let records = vec![
            scored(Outcome::Approved, &[("security", 9.0), ("style", 4.0)]),
            scored(Outcome::Rejected, &[("security", 3.0), ("style", 8.0)]),
        ];
        let mut weights = BTreeMap::new();
        weights.insert("security".to_string(), 3.0);
        weights.insert("style".to_string(), 0.5);

        let report = run_benchmark(&records, &weights, 30);
        assert_eq!(report.records_scored, 2);
        assert_eq!(report.uniform.mean_favorable, Some(6.5));
        assert_eq!(report.uniform.mean_rejected, Some(5.5));
        assert_eq!(report.uniform.separation, Some(1.0));
        // (27 + 2) / 3.5 = 8.29 ; (9 + 4) / 3.5 = 3.71
        assert_eq!(report.current.mean_favorable, Some(8.29));
        assert_eq!(report.current.mean_rejected, Some(3.71));
        assert_eq!(report.current.separation, Some(4.58));
        assert_eq!(report.improvement(), Some(3.58));
    }

    #[test]
    fn test_pending_and_unscored_records_are_ignored() {
        let records = vec![
            scored(Outcome::Pending, &[("security", 9.0)]),
            scored(Outcome::Approved, &[]),
            scored(Outcome::Edited, &[("security", 7.0)]),
        ];
        let report = run_benchmark(&records, &BTreeMap::new(), 7);
        assert_eq!(report.records_scored, 1);
        assert_eq!(report.current.mean_favorable, Some(7.0));
        assert_eq!(report.current.mean_rejected, None);
        assert_eq!(report.current.separation, None);
        assert_eq!(report.improvement(), None);
    }
}
