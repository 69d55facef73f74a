// Configuration structs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::constants::*;
use crate::adaptation::WeightHistoryEntry;

/// Where logs live. Unset paths resolve relative to the data directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the date-partitioned audit logs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_dir: Option<PathBuf>,

    /// Append-only weight-change log
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_log: Option<PathBuf>,
}

/// Reflection thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionConfig {
    /// Reviewers at or above this precision are "high precision"
    #[serde(default = "default_precision_threshold")]
    pub precision_threshold: f64,

    /// Outcome-bearing reviews required before metrics are trusted, and
    /// per-reviewer participation required before its weight moves
    #[serde(default = "default_min_reviews")]
    pub min_reviews: usize,

    /// Default measurement window in days
    #[serde(default = "default_window_days")]
    pub window_days: u32,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            precision_threshold: DEFAULT_PRECISION_THRESHOLD,
            min_reviews: DEFAULT_MIN_REVIEWS,
            window_days: DEFAULT_WINDOW_DAYS,
        }
    }
}

fn default_precision_threshold() -> f64 {
    DEFAULT_PRECISION_THRESHOLD
}

fn default_min_reviews() -> usize {
    DEFAULT_MIN_REVIEWS
}

fn default_window_days() -> u32 {
    DEFAULT_WINDOW_DAYS
}

/// Merge behaviour
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Reviewer roles in priority order (first wins conflicts)
    #[serde(default)]
    pub priority: Vec<String>,
}

/// Reviewer weights and their recent history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Role → weight used in composite scoring (absent roles weigh 1.0)
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,

    /// Most recent weight changes, oldest first, capped
    #[serde(default)]
    pub weights_history: Vec<WeightHistoryEntry>,
}

impl ScoringConfig {
    /// Append a history entry, dropping the oldest beyond the cap
    pub fn push_history(&mut self, entry: WeightHistoryEntry) {
        self.weights_history.push(entry);
        if self.weights_history.len() > WEIGHT_HISTORY_CAP {
            let excess = self.weights_history.len() - WEIGHT_HISTORY_CAP;
            self.weights_history.drain(..excess);
        }
    }
}

/// Top-level configuration document (`config.toml`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub reflection: ReflectionConfig,

    #[serde(default)]
    pub merge: MergeConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,
}

impl Config {
    /// Validate configuration and return helpful errors
    pub fn validate(&self) -> anyhow::Result<()> {
        let threshold = self.reflection.precision_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            anyhow::bail!(
                "reflection.precision_threshold must be between 0 and 1 (got {})",
                threshold
            );
        }

        for (role, weight) in &self.scoring.weights {
            if !weight.is_finite() || *weight <= 0.0 {
                anyhow::bail!(
                    "scoring.weights.{} must be a positive number (got {})",
                    role,
                    weight
                );
            }
        }

        Ok(())
    }

    /// Audit log directory, resolved against the data directory
    pub fn audit_dir(&self, data_dir: &Path) -> PathBuf {
        resolve(data_dir, self.paths.audit_dir.as_deref(), AUDIT_DIR_NAME)
    }

    /// Weight-change log path, resolved against the data directory
    pub fn weight_log(&self, data_dir: &Path) -> PathBuf {
        resolve(data_dir, self.paths.weight_log.as_deref(), WEIGHT_LOG_FILE_NAME)
    }
}

fn resolve(data_dir: &Path, configured: Option<&Path>, default_name: &str) -> PathBuf {
    match configured {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => data_dir.join(path),
        None => data_dir.join(default_name),
    }
}
