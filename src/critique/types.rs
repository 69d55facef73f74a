// Critique types — what reviewers hand in, and what the merger hands back

use serde::{Deserialize, Deserializer, Serialize};

use crate::audit::{Finding, OpKind, Severity};

/// A single edit suggested by a finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedOp {
    pub op: OpKind,
    pub target: String,
    #[serde(default)]
    pub value: String,
    /// Text being replaced, for rewording ops
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
}

/// One issue raised by a reviewer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CritiqueFinding {
    pub id: String,
    pub severity: Severity,
    /// Reviewer's certainty the issue exists (0.0–1.0)
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub issue: String,
    #[serde(default)]
    pub suggested_ops: Vec<SuggestedOp>,
}

fn default_confidence() -> f64 {
    1.0
}

/// A full critique from one reviewer role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Critique {
    /// The reviewer that produced this critique (e.g. "security", "clarity")
    pub reviewer_role: String,
    #[serde(default)]
    pub findings: Vec<CritiqueFinding>,
    /// Overall quality score 0–10; anything non-numeric reads as absent
    #[serde(default, deserialize_with = "lenient_score")]
    pub score: Option<f64>,
    /// Reviewer explicitly reported nothing to change
    #[serde(default)]
    pub no_issues: bool,
}

impl Critique {
    /// A critique with nothing to say
    pub fn clean(reviewer_role: impl Into<String>, score: Option<f64>) -> Self {
        Self {
            reviewer_role: reviewer_role.into(),
            findings: Vec::new(),
            score,
            no_issues: true,
        }
    }

    /// Score usable for compositing: present, not NaN, within [0, 10]
    pub fn usable_score(&self) -> Option<f64> {
        self.score
            .filter(|s| !s.is_nan() && (0.0..=10.0).contains(s))
    }
}

fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_f64())
}

/// An op flattened out of its finding, tagged with where it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaggedOp {
    pub role: String,
    pub finding_id: String,
    pub severity: Severity,
    pub confidence: f64,
    pub issue: String,
    #[serde(flatten)]
    pub op: SuggestedOp,
}

impl TaggedOp {
    fn to_finding(&self) -> Finding {
        Finding {
            reviewer_role: self.role.clone(),
            finding_id: self.finding_id.clone(),
            severity: self.severity,
            op: self.op.op,
            target: self.op.target.clone(),
            value: self.op.value.clone(),
            issue: self.issue.clone(),
        }
    }
}

/// Side of a conflict, referenced by role and finding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictSide {
    pub role: String,
    pub finding_id: String,
    pub op: OpKind,
}

impl From<&TaggedOp> for ConflictSide {
    fn from(op: &TaggedOp) -> Self {
        Self {
            role: op.role.clone(),
            finding_id: op.finding_id.clone(),
            op: op.op.op,
        }
    }
}

/// An add-vs-remove disagreement on the same target and value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conflict {
    pub target: String,
    pub value: String,
    pub addition: ConflictSide,
    pub removal: ConflictSide,
    pub resolution: String,
}

impl Conflict {
    /// Role that prevails under a priority list. Unlisted roles lose to
    /// listed ones; between two unlisted roles the addition stands.
    pub fn winner<'a>(&'a self, priority: &[String]) -> &'a str {
        let rank = |role: &str| {
            priority
                .iter()
                .position(|p| p == role)
                .unwrap_or(priority.len())
        };
        if rank(&self.removal.role) < rank(&self.addition.role) {
            &self.removal.role
        } else {
            &self.addition.role
        }
    }
}

/// Merged edit plan
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeResult {
    pub ops: Vec<TaggedOp>,
    pub conflicts: Vec<Conflict>,
    pub severity_max: Severity,
    /// Every reviewer reported no issues and nothing was suggested
    pub no_changes: bool,
}

impl MergeResult {
    /// Findings as persisted in the audit record, one per merged op
    pub fn findings_detail(&self) -> Vec<Finding> {
        self.ops.iter().map(TaggedOp::to_finding).collect()
    }
}
