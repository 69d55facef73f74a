// Reflection aggregator — per-reviewer precision and outcome correlation
//
// Records are loaded over a trailing window of date partitions. Integrity
// failures and malformed lines are counted, never fatal.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

use crate::audit::{AuditRecord, AuditStore};
use crate::config::ReflectionConfig;
use crate::critique::round_to;
use crate::errors::AuditResult;

/// Derived per-reviewer statistics for one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewerMetrics {
    pub role: String,
    pub proposed: u32,
    pub accepted: u32,
    pub rejected: u32,
    /// Distinct reviews the role produced findings in
    pub review_count: usize,
    pub precision: f64,
    pub outcome_correlation: f64,
}

/// Records in a window plus what was left out
#[derive(Debug, Default)]
pub struct LoadedWindow {
    pub records: Vec<AuditRecord>,
    pub skipped: usize,
    pub malformed: usize,
    pub partitions_read: usize,
}

/// Result of reflecting over a window
#[derive(Debug, Clone, Serialize)]
pub struct ReflectionReport {
    pub generated_at: DateTime<Utc>,
    pub window_days: u32,
    pub total_records: usize,
    /// Records with an outcome other than pending
    pub outcome_records: usize,
    /// Records excluded for failing integrity verification
    pub skipped: usize,
    pub malformed: usize,
    pub sufficient_data: bool,
    pub reviewers: BTreeMap<String, ReviewerMetrics>,
    pub low_precision_roles: Vec<String>,
    pub high_precision_roles: Vec<String>,
}

impl ReflectionReport {
    /// Precision per role, as recorded with weight changes
    pub fn precision_by_role(&self) -> BTreeMap<String, f64> {
        self.reviewers
            .iter()
            .map(|(role, m)| (role.clone(), m.precision))
            .collect()
    }
}

#[derive(Default)]
struct RoleTally {
    proposed: u32,
    accepted: u32,
    rejected: u32,
    participation: HashSet<DateTime<Utc>>,
    favorable: HashSet<DateTime<Utc>>,
}

/// Count per-role findings, acceptances and favorable outcomes
pub fn compute_metrics(records: &[AuditRecord]) -> BTreeMap<String, ReviewerMetrics> {
    let mut tallies: BTreeMap<String, RoleTally> = BTreeMap::new();

    for record in records {
        let accepted: HashSet<&str> = record
            .suggestions_accepted
            .iter()
            .map(String::as_str)
            .collect();
        let rejected: HashSet<&str> = record
            .suggestions_rejected
            .iter()
            .map(String::as_str)
            .collect();

        let mut had_accepted: HashMap<&str, bool> = HashMap::new();

        for finding in &record.findings_detail {
            let role = finding.reviewer_role.as_str();
            let tally = tallies.entry(role.to_string()).or_default();
            tally.proposed += 1;
            tally.participation.insert(record.timestamp);

            let id = finding.finding_id.as_str();
            if accepted.contains(id) {
                tally.accepted += 1;
                had_accepted.insert(role, true);
            }
            if rejected.contains(id) {
                tally.rejected += 1;
            }
        }

        if record.outcome.is_favorable() {
            for (role, _) in had_accepted.iter().filter(|(_, hit)| **hit) {
                if let Some(tally) = tallies.get_mut(*role) {
                    tally.favorable.insert(record.timestamp);
                }
            }
        }
    }

    tallies
        .into_iter()
        .map(|(role, t)| {
            let precision = if t.proposed == 0 {
                0.0
            } else {
                t.accepted as f64 / t.proposed as f64
            };
            let outcome_correlation = if t.participation.is_empty() {
                0.0
            } else {
                t.favorable.len() as f64 / t.participation.len() as f64
            };
            let metrics = ReviewerMetrics {
                role: role.clone(),
                proposed: t.proposed,
                accepted: t.accepted,
                rejected: t.rejected,
                review_count: t.participation.len(),
                precision: round_to(precision, 4),
                outcome_correlation: round_to(outcome_correlation, 4),
            };
            (role, metrics)
        })
        .collect()
}

/// Split roles into (low, high) around the threshold, alphabetically
pub fn partition_by_precision(
    metrics: &BTreeMap<String, ReviewerMetrics>,
    threshold: f64,
) -> (Vec<String>, Vec<String>) {
    // BTreeMap iteration is already alphabetical
    let (high, low): (Vec<_>, Vec<_>) = metrics
        .values()
        .partition(|m| m.precision >= threshold);
    (
        low.into_iter().map(|m| m.role.clone()).collect(),
        high.into_iter().map(|m| m.role.clone()).collect(),
    )
}

/// Aggregate already-loaded records into a report
pub fn aggregate(
    records: &[AuditRecord],
    config: &ReflectionConfig,
    window_days: u32,
) -> ReflectionReport {
    let outcome_records = records.iter().filter(|r| !r.outcome.is_pending()).count();
    let sufficient_data = !records.is_empty() && outcome_records >= config.min_reviews;

    let mut report = ReflectionReport {
        generated_at: Utc::now(),
        window_days,
        total_records: records.len(),
        outcome_records,
        skipped: 0,
        malformed: 0,
        sufficient_data,
        reviewers: BTreeMap::new(),
        low_precision_roles: Vec::new(),
        high_precision_roles: Vec::new(),
    };

    if !sufficient_data {
        debug!(
            "Insufficient data: {} outcome-bearing records, {} required",
            outcome_records, config.min_reviews
        );
        return report;
    }

    report.reviewers = compute_metrics(records);
    let (low, high) = partition_by_precision(&report.reviewers, config.precision_threshold);
    report.low_precision_roles = low;
    report.high_precision_roles = high;
    report
}

/// Loads windows of audit records and reflects on them
pub struct Aggregator<'a> {
    store: &'a AuditStore,
    config: ReflectionConfig,
}

impl<'a> Aggregator<'a> {
    pub fn new(store: &'a AuditStore, config: ReflectionConfig) -> Self {
        Self { store, config }
    }

    /// Load every partition dated on or after `today - days` (UTC)
    pub fn load_window(&self, days: u32) -> AuditResult<LoadedWindow> {
        let cutoff = (Utc::now() - Duration::days(i64::from(days))).date_naive();
        self.load_since(cutoff)
    }

    /// Load every partition dated on or after `cutoff`
    pub fn load_since(&self, cutoff: NaiveDate) -> AuditResult<LoadedWindow> {
        let mut window = LoadedWindow::default();
        for date in self.store.partition_dates()? {
            if date < cutoff {
                continue;
            }
            let scan = self.store.load_partition(date)?;
            window.records.extend(scan.records);
            window.skipped += scan.skipped;
            window.malformed += scan.malformed;
            window.partitions_read += 1;
        }

        debug!(
            "Loaded {} records from {} partitions since {} ({} skipped, {} malformed)",
            window.records.len(),
            window.partitions_read,
            cutoff,
            window.skipped,
            window.malformed
        );
        Ok(window)
    }

    /// Load and aggregate the trailing window
    pub fn reflect(&self, days: u32) -> AuditResult<(ReflectionReport, LoadedWindow)> {
        let window = self.load_window(days)?;
        let mut report = aggregate(&window.records, &self.config, days);
        report.skipped = window.skipped;
        report.malformed = window.malformed;

        info!(
            "Reflection over {} days: {} records, {} with outcomes, {} reviewers",
            days,
            report.total_records,
            report.outcome_records,
            report.reviewers.len()
        );
        Ok((report, window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{Finding, OpKind, Outcome, Severity};
    use chrono::TimeZone;

    fn finding(role: &str, id: &str) -> Finding {
        Finding {
            reviewer_role: role.into(),
            finding_id: id.into(),
            severity: Severity::Minor,
            op: OpKind::Reword,
            target: "task".into(),
            value: id.into(),
            issue: String::new(),
        }
    }

    fn record(
        minute: u32,
        outcome: Outcome,
        findings: Vec<Finding>,
        accepted: &[&str],
        rejected: &[&str],
    ) -> AuditRecord {
        let mut r = AuditRecord::new("demo", format!("h{}", minute));
        r.timestamp = Utc.with_ymd_and_hms(2026, 5, 1, 12, minute, 0).unwrap();
        r.findings_detail = findings;
        r.outcome = outcome;
        r.suggestions_accepted = accepted.iter().map(|s| s.to_string()).collect();
        r.suggestions_rejected = rejected.iter().map(|s| s.to_string()).collect();
        r
    }

    fn lenient() -> ReflectionConfig {
        ReflectionConfig {
            min_reviews: 1,
            ..ReflectionConfig::default()
        }
    }

    // ── compute_metrics ───────────────────────────────────────────────────────

    #[test]
    fn test_precision_three_of_four() {
        let records = vec![
            record(
                1,
                Outcome::Approved,
                vec![finding("security", "a"), finding("security", "b")],
                &["a", "b"],
                &[],
            ),
            record(
                2,
                Outcome::Edited,
                vec![finding("security", "c"), finding("security", "d")],
                &["c"],
                &["d"],
            ),
        ];
        let metrics = compute_metrics(&records);
        let security = &metrics["security"];
        assert_eq!(security.proposed, 4);
        assert_eq!(security.accepted, 3);
        assert_eq!(security.rejected, 1);
        assert_eq!(security.review_count, 2);
        assert_eq!(security.precision, 0.75);
    }

    #[test]
    fn test_review_count_counts_distinct_reviews() {
        let records = vec![record(
            1,
            Outcome::Approved,
            vec![
                finding("clarity", "a"),
                finding("clarity", "b"),
                finding("clarity", "c"),
            ],
            &[],
            &[],
        )];
        let metrics = compute_metrics(&records);
        assert_eq!(metrics["clarity"].proposed, 3);
        assert_eq!(metrics["clarity"].review_count, 1);
    }

    #[test]
    fn test_outcome_correlation_needs_accept_and_good_outcome() {
        let records = vec![
            // accepted + approved → counts
            record(1, Outcome::Approved, vec![finding("testing", "a")], &["a"], &[]),
            // accepted but rejected outcome → no
            record(2, Outcome::Rejected, vec![finding("testing", "b")], &["b"], &[]),
            // good outcome but nothing accepted → no
            record(3, Outcome::Edited, vec![finding("testing", "c")], &[], &["c"]),
        ];
        let metrics = compute_metrics(&records);
        assert_eq!(metrics["testing"].outcome_correlation, 0.3333);
        assert_eq!(metrics["testing"].precision, 0.6667);
    }

    #[test]
    fn test_roles_are_tracked_independently() {
        let records = vec![record(
            1,
            Outcome::Approved,
            vec![finding("security", "s"), finding("clarity", "c")],
            &["s"],
            &["c"],
        )];
        let metrics = compute_metrics(&records);
        assert_eq!(metrics["security"].outcome_correlation, 1.0);
        assert_eq!(metrics["clarity"].outcome_correlation, 0.0);
        assert_eq!(metrics["clarity"].precision, 0.0);
    }

    // ── aggregate ─────────────────────────────────────────────────────────────

    #[test]
    fn test_insufficient_data_has_empty_metrics() {
        let records = vec![
            record(1, Outcome::Approved, vec![finding("security", "a")], &["a"], &[]),
            record(2, Outcome::Pending, vec![finding("security", "b")], &[], &[]),
        ];
        let report = aggregate(&records, &ReflectionConfig::default(), 30);
        assert!(!report.sufficient_data);
        assert_eq!(report.outcome_records, 1);
        assert_eq!(report.total_records, 2);
        assert!(report.reviewers.is_empty());
    }

    #[test]
    fn test_zero_records_is_insufficient_even_with_zero_minimum() {
        let config = ReflectionConfig {
            min_reviews: 0,
            ..ReflectionConfig::default()
        };
        let report = aggregate(&[], &config, 30);
        assert!(!report.sufficient_data);
    }

    #[test]
    fn test_precision_partition_is_alphabetical() {
        let records = vec![record(
            1,
            Outcome::Approved,
            vec![
                finding("zeta", "z"),
                finding("alpha", "a"),
                finding("mid", "m1"),
                finding("mid", "m2"),
                finding("beta", "b"),
            ],
            &["z", "alpha-missing", "m1", "b"],
            &[],
        )];
        let report = aggregate(&records, &lenient(), 30);
        assert!(report.sufficient_data);
        assert_eq!(report.high_precision_roles, vec!["beta", "zeta"]);
        assert_eq!(report.low_precision_roles, vec!["alpha", "mid"]);
    }

    #[test]
    fn test_threshold_is_inclusive_for_high() {
        let records = vec![record(
            1,
            Outcome::Approved,
            vec![finding("r", "1"), finding("r", "2")],
            &["1"],
            &[],
        )];
        let config = ReflectionConfig {
            precision_threshold: 0.5,
            min_reviews: 1,
            ..ReflectionConfig::default()
        };
        let report = aggregate(&records, &config, 30);
        assert_eq!(report.high_precision_roles, vec!["r"]);
    }

    // ── load_window ───────────────────────────────────────────────────────────

    #[test]
    fn test_load_window_excludes_old_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let store = AuditStore::new(dir.path().to_path_buf()).unwrap();

        let mut recent = AuditRecord::new("demo", "recent");
        store.append(&mut recent).unwrap();

        let mut old = AuditRecord::new("demo", "old");
        old.timestamp = Utc::now() - Duration::days(45);
        store.append(&mut old).unwrap();

        let aggregator = Aggregator::new(&store, ReflectionConfig::default());
        let window = aggregator.load_window(30).unwrap();
        assert_eq!(window.records.len(), 1);
        assert_eq!(window.records[0].prompt_hash, "recent");

        let wide = aggregator.load_window(60).unwrap();
        assert_eq!(wide.records.len(), 2);
    }
}
