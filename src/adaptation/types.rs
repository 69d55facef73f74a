// Adaptation types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::reflection::ReflectionReport;

/// Proposed weight change for one reviewer role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightSuggestion {
    pub role: String,
    pub current: f64,
    pub suggested: f64,
    pub delta: f64,
    pub reason: String,
}

/// Snapshot of one weight change, kept in the config and in the change log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightHistoryEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub weights_before: BTreeMap<String, f64>,
    #[serde(default)]
    pub weights_after: BTreeMap<String, f64>,
    /// Reviewer precision over the window that justified the change
    #[serde(default)]
    pub precision_at_change: BTreeMap<String, f64>,
    pub measurement_period_days: u32,
}

/// What `preview` would change
#[derive(Debug, Clone, Serialize)]
pub struct AdaptationPreview {
    pub sufficient_data: bool,
    pub window_days: u32,
    pub diff: Vec<WeightSuggestion>,
    pub report: ReflectionReport,
}

/// Result of `apply`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// Weights were written to the config
    Applied {
        changes: Vec<WeightSuggestion>,
        entry: WeightHistoryEntry,
        /// Whether the weight-change log append succeeded
        history_logged: bool,
    },
    /// Not enough outcome-bearing reviews in the window
    InsufficientData { outcome_records: usize, required: usize },
    /// Enough data overall, but no reviewer met the participation minimum
    NoQualifyingReviewers,
}

impl ApplyOutcome {
    pub fn success(&self) -> bool {
        matches!(self, ApplyOutcome::Applied { .. })
    }
}
