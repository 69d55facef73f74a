// Audit record types — one record per review cycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::critique::MergeResult;

/// Ordinal finding importance (blocker > major > minor > nit)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Nit,
    Minor,
    Major,
    Blocker,
}

impl Severity {
    /// Numeric rank used when comparing duplicate suggestions
    pub fn rank(self) -> u8 {
        match self {
            Severity::Nit => 1,
            Severity::Minor => 2,
            Severity::Major => 3,
            Severity::Blocker => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Nit => "nit",
            Severity::Minor => "minor",
            Severity::Major => "major",
            Severity::Blocker => "blocker",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of edit a reviewer suggests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpKind {
    AddConstraint,
    AddGuardrail,
    RemoveConstraint,
    AddContext,
    AddExample,
    Reword,
    Restructure,
    Clarify,
}

impl OpKind {
    /// Ops that add a rule to the text; these conflict with `RemoveConstraint`
    pub fn is_additive(self) -> bool {
        matches!(self, OpKind::AddConstraint | OpKind::AddGuardrail)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OpKind::AddConstraint => "ADD_CONSTRAINT",
            OpKind::AddGuardrail => "ADD_GUARDRAIL",
            OpKind::RemoveConstraint => "REMOVE_CONSTRAINT",
            OpKind::AddContext => "ADD_CONTEXT",
            OpKind::AddExample => "ADD_EXAMPLE",
            OpKind::Reword => "REWORD",
            OpKind::Restructure => "RESTRUCTURE",
            OpKind::Clarify => "CLARIFY",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review outcome. `Pending` moves exactly once to one of the other three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    #[default]
    Pending,
    Approved,
    Edited,
    Rejected,
}

impl Outcome {
    /// Approved and edited reviews count as good outcomes
    pub fn is_favorable(self) -> bool {
        matches!(self, Outcome::Approved | Outcome::Edited)
    }

    pub fn is_pending(self) -> bool {
        self == Outcome::Pending
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Pending => "pending",
            Outcome::Approved => "approved",
            Outcome::Edited => "edited",
            Outcome::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Outcome::Pending),
            "approved" => Ok(Outcome::Approved),
            "edited" => Ok(Outcome::Edited),
            "rejected" => Ok(Outcome::Rejected),
            other => Err(format!(
                "unknown outcome '{}' (expected approved, edited or rejected)",
                other
            )),
        }
    }
}

/// A single suggested edit as persisted in the audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub reviewer_role: String,
    pub finding_id: String,
    pub severity: Severity,
    pub op: OpKind,
    pub target: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub issue: String,
}

/// Per-role counters stored alongside the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReviewerStats {
    pub proposed: u32,
    pub accepted: u32,
    pub rejected: u32,
}

/// Everything that happened in one review cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub project: String,
    pub prompt_hash: String,
    #[serde(default)]
    pub reviewers_active: Vec<String>,
    #[serde(default)]
    pub findings_detail: Vec<Finding>,
    #[serde(default)]
    pub suggestions_accepted: Vec<String>,
    #[serde(default)]
    pub suggestions_rejected: Vec<String>,
    /// Rejected finding id → reason (filled in when the outcome is reported)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rejection_details: BTreeMap<String, String>,
    #[serde(default)]
    pub reviewer_stats: BTreeMap<String, ReviewerStats>,
    #[serde(default)]
    pub severity_max: Severity,
    #[serde(default)]
    pub outcome: Outcome,
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub composite_score: Option<f64>,
    /// Cost of the review cycle in USD
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity_hash: Option<String>,
}

/// Inputs a pipeline run hands over when it finishes a review cycle
#[derive(Debug, Clone)]
pub struct ReviewCycle<'a> {
    pub project: &'a str,
    pub prompt_hash: &'a str,
    pub reviewers_active: Vec<String>,
    pub merge: &'a MergeResult,
    pub scores: BTreeMap<String, f64>,
    pub composite_score: Option<f64>,
    pub cost: f64,
    pub duration_ms: u64,
}

impl AuditRecord {
    /// Minimal pending record, mostly useful for tests and collaborators
    /// that fill the fields themselves
    pub fn new(project: impl Into<String>, prompt_hash: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            project: project.into(),
            prompt_hash: prompt_hash.into(),
            reviewers_active: Vec::new(),
            findings_detail: Vec::new(),
            suggestions_accepted: Vec::new(),
            suggestions_rejected: Vec::new(),
            rejection_details: BTreeMap::new(),
            reviewer_stats: BTreeMap::new(),
            severity_max: Severity::Nit,
            outcome: Outcome::Pending,
            scores: BTreeMap::new(),
            composite_score: None,
            cost: 0.0,
            duration_ms: 0,
            integrity_hash: None,
        }
    }

    /// Build the pending record for a finished review cycle
    pub fn from_review(cycle: ReviewCycle<'_>) -> Self {
        let mut record = Self::new(cycle.project, cycle.prompt_hash);
        record.reviewers_active = cycle.reviewers_active;
        record.findings_detail = cycle.merge.findings_detail();
        record.severity_max = cycle.merge.severity_max;
        record.scores = cycle.scores;
        record.composite_score = cycle.composite_score;
        record.cost = cycle.cost;
        record.duration_ms = cycle.duration_ms;
        record.recompute_reviewer_stats();
        record
    }

    /// The record's partition date (UTC)
    pub fn date_key(&self) -> String {
        self.timestamp.format("%Y-%m-%d").to_string()
    }

    /// Rebuild `reviewer_stats` from `findings_detail` and the current
    /// accepted/rejected sets. Active reviewers without findings get zeros.
    pub fn recompute_reviewer_stats(&mut self) {
        let accepted: BTreeSet<&str> = self
            .suggestions_accepted
            .iter()
            .map(String::as_str)
            .collect();
        let rejected: BTreeSet<&str> = self
            .suggestions_rejected
            .iter()
            .map(String::as_str)
            .collect();

        let mut stats: BTreeMap<String, ReviewerStats> = self
            .reviewers_active
            .iter()
            .map(|role| (role.clone(), ReviewerStats::default()))
            .collect();

        for finding in &self.findings_detail {
            let entry = stats.entry(finding.reviewer_role.clone()).or_default();
            entry.proposed += 1;
            if accepted.contains(finding.finding_id.as_str()) {
                entry.accepted += 1;
            }
            if rejected.contains(finding.finding_id.as_str()) {
                entry.rejected += 1;
            }
        }

        self.reviewer_stats = stats;
    }
}
