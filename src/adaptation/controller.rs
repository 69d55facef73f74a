// Adaptation controller — turns reflection metrics into reviewer weights
//
// Weights move proportionally to each reviewer's precision relative to the
// portfolio average and are clamped to [MIN_WEIGHT, MAX_WEIGHT]. The clamp is
// the only bound on a single adaptation.

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

use super::benchmark::{run_benchmark, BenchmarkReport};
use super::history::WeightChangeLog;
use super::types::{AdaptationPreview, ApplyOutcome, WeightHistoryEntry, WeightSuggestion};
use crate::audit::AuditStore;
use crate::config::{Config, ConfigStore};
use crate::critique::round_to;
use crate::critique::scoring::DEFAULT_WEIGHT;
use crate::reflection::{Aggregator, LoadedWindow, ReflectionReport, ReviewerMetrics};

pub const MIN_WEIGHT: f64 = 0.5;
pub const MAX_WEIGHT: f64 = 3.0;

/// |delta| above this is reported as an increase/decrease
const NEAR_AVERAGE_BAND: f64 = 0.05;

pub const REASON_INCREASE: &str = "high precision, increase";
pub const REASON_DECREASE: &str = "low precision, decrease";
pub const REASON_HOLD: &str = "near portfolio average";

/// Suggest new weights for reviewers with enough participation.
///
/// Roles below `min_reviews` are left out entirely; if none qualify the
/// result is empty.
pub fn compute_weight_suggestions(
    metrics: &BTreeMap<String, ReviewerMetrics>,
    current_weights: &BTreeMap<String, f64>,
    min_reviews: usize,
) -> Vec<WeightSuggestion> {
    let qualifying: Vec<&ReviewerMetrics> = metrics
        .values()
        .filter(|m| m.review_count >= min_reviews)
        .collect();
    if qualifying.is_empty() {
        return Vec::new();
    }

    let avg_precision =
        qualifying.iter().map(|m| m.precision).sum::<f64>() / qualifying.len() as f64;

    qualifying
        .into_iter()
        .map(|m| {
            let current = current_weights
                .get(&m.role)
                .copied()
                .unwrap_or(DEFAULT_WEIGHT);
            // Every reviewer at zero precision: nothing to rank against
            let ratio = if avg_precision > 0.0 {
                m.precision / avg_precision
            } else {
                1.0
            };
            let suggested = round_to((current * ratio).clamp(MIN_WEIGHT, MAX_WEIGHT), 2);
            let delta = round_to(suggested - current, 2);
            let reason = if delta > NEAR_AVERAGE_BAND {
                REASON_INCREASE
            } else if delta < -NEAR_AVERAGE_BAND {
                REASON_DECREASE
            } else {
                REASON_HOLD
            };

            WeightSuggestion {
                role: m.role.clone(),
                current,
                suggested,
                delta,
                reason: reason.to_string(),
            }
        })
        .collect()
}

/// Previews and applies weight adaptations against one config file,
/// audit directory and weight-change log
pub struct AdaptationController {
    config_store: ConfigStore,
    audit: AuditStore,
    change_log: WeightChangeLog,
}

impl AdaptationController {
    pub fn new(config_store: ConfigStore, audit: AuditStore, change_log: WeightChangeLog) -> Self {
        Self {
            config_store,
            audit,
            change_log,
        }
    }

    /// Build a controller whose log locations come from the config file
    /// itself (relative paths resolve next to it)
    pub fn open(config_path: PathBuf) -> Result<Self> {
        let config_store = ConfigStore::new(config_path);
        let config = config_store.load()?;
        let base = config_store.base_dir();
        let audit = AuditStore::new(config.audit_dir(&base))
            .context("Failed to open audit log directory")?;
        let change_log = WeightChangeLog::new(config.weight_log(&base));
        Ok(Self::new(config_store, audit, change_log))
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.config_store
    }

    pub fn audit_store(&self) -> &AuditStore {
        &self.audit
    }

    pub fn change_log(&self) -> &WeightChangeLog {
        &self.change_log
    }

    fn reflect(&self, config: &Config, days: u32) -> Result<(ReflectionReport, LoadedWindow)> {
        Aggregator::new(&self.audit, config.reflection.clone())
            .reflect(days)
            .context("Failed to load audit window")
    }

    /// What `apply` would change, without writing anything
    pub fn preview(&self, days: u32) -> Result<AdaptationPreview> {
        let config = self.config_store.load()?;
        let (report, _) = self.reflect(&config, days)?;

        let diff = if report.sufficient_data {
            compute_weight_suggestions(
                &report.reviewers,
                &config.scoring.weights,
                config.reflection.min_reviews,
            )
        } else {
            Vec::new()
        };

        Ok(AdaptationPreview {
            sufficient_data: report.sufficient_data,
            window_days: days,
            diff,
            report,
        })
    }

    /// Compute and persist new weights.
    ///
    /// The config write is the commit point and its failure is returned.
    /// The weight-change log append afterwards is best-effort.
    pub fn apply(&self, days: u32) -> Result<ApplyOutcome> {
        let preview = self.preview(days)?;
        if !preview.sufficient_data {
            let required = self.config_store.load()?.reflection.min_reviews;
            return Ok(ApplyOutcome::InsufficientData {
                outcome_records: preview.report.outcome_records,
                required,
            });
        }
        if preview.diff.is_empty() {
            return Ok(ApplyOutcome::NoQualifyingReviewers);
        }

        let report = preview.report;
        let applied = self
            .config_store
            .update(|config| {
                // Recompute against the weights as they are under the lock
                let changes = compute_weight_suggestions(
                    &report.reviewers,
                    &config.scoring.weights,
                    config.reflection.min_reviews,
                );
                let before = config.scoring.weights.clone();
                let mut after = before.clone();
                for change in &changes {
                    after.insert(change.role.clone(), change.suggested);
                }

                let entry = WeightHistoryEntry {
                    timestamp: Utc::now(),
                    weights_before: before,
                    weights_after: after.clone(),
                    precision_at_change: report.precision_by_role(),
                    measurement_period_days: days,
                };
                config.scoring.push_history(entry.clone());
                config.scoring.weights = after;
                Ok((changes, entry))
            })
            .context("Failed to persist adapted weights")?;
        let (changes, entry) = applied;

        info!(
            "Applied weight adaptation over {} days to {} reviewers",
            days,
            changes.len()
        );

        let history_logged = match self.change_log.append(&entry) {
            Ok(()) => true,
            Err(e) => {
                warn!("Weights changed but the change log was not updated: {}", e);
                false
            }
        };

        Ok(ApplyOutcome::Applied {
            changes,
            entry,
            history_logged,
        })
    }

    /// Most recent weight changes from the change log, oldest first
    pub fn history(&self, limit: Option<usize>) -> Result<Vec<WeightHistoryEntry>> {
        self.change_log
            .read(limit)
            .context("Failed to read weight-change log")
    }

    /// Compare current weights against uniform weights over the window
    pub fn benchmark(&self, days: u32) -> Result<BenchmarkReport> {
        let config = self.config_store.load()?;
        let (_, window) = self.reflect(&config, days)?;
        Ok(run_benchmark(&window.records, &config.scoring.weights, days))
    }
}
