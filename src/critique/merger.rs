// Critique merger — turns several reviewers' critiques into one edit plan
//
// Pipeline: extract → deduplicate → detect conflicts → priority order.

use std::collections::HashMap;
use tracing::debug;

use super::types::{Conflict, ConflictSide, Critique, MergeResult, TaggedOp};
use crate::audit::{OpKind, Severity};

pub const CONFLICT_RESOLUTION: &str = "higher-priority reviewer wins";

/// Flatten every finding's suggested ops, tagged with their origin
pub fn extract_ops(critiques: &[Critique]) -> Vec<TaggedOp> {
    critiques
        .iter()
        .flat_map(|critique| {
            critique.findings.iter().flat_map(move |finding| {
                finding.suggested_ops.iter().map(move |op| TaggedOp {
                    role: critique.reviewer_role.clone(),
                    finding_id: finding.id.clone(),
                    severity: finding.severity,
                    confidence: finding.confidence,
                    issue: finding.issue.clone(),
                    op: op.clone(),
                })
            })
        })
        .collect()
}

/// Collapse ops with the same (op, target, value).
///
/// The first occurrence keeps its position; a later duplicate replaces it
/// only when its severity is strictly higher.
pub fn deduplicate_ops(ops: Vec<TaggedOp>) -> Vec<TaggedOp> {
    let mut kept: Vec<TaggedOp> = Vec::with_capacity(ops.len());
    let mut index: HashMap<(OpKind, String, String), usize> = HashMap::new();

    for op in ops {
        let key = (op.op.op, op.op.target.clone(), op.op.value.clone());
        match index.get(&key) {
            Some(&pos) => {
                if op.severity.rank() > kept[pos].severity.rank() {
                    debug!(
                        "Duplicate {} on '{}' from {} outranks {}",
                        op.op.op, op.op.target, op.role, kept[pos].role
                    );
                    kept[pos] = op;
                }
            }
            None => {
                index.insert(key, kept.len());
                kept.push(op);
            }
        }
    }
    kept
}

/// Find add-vs-remove pairs on the same target with case-insensitively
/// equal values
pub fn detect_conflicts(ops: &[TaggedOp]) -> Vec<Conflict> {
    let mut targets: Vec<&str> = Vec::new();
    let mut by_target: HashMap<&str, Vec<&TaggedOp>> = HashMap::new();
    for op in ops {
        let group = by_target.entry(op.op.target.as_str()).or_insert_with(|| {
            targets.push(op.op.target.as_str());
            Vec::new()
        });
        group.push(op);
    }

    let mut conflicts = Vec::new();
    for target in targets {
        let group = &by_target[target];
        for (i, a) in group.iter().enumerate() {
            for b in &group[i + 1..] {
                let (addition, removal) = if a.op.op.is_additive()
                    && b.op.op == OpKind::RemoveConstraint
                {
                    (a, b)
                } else if b.op.op.is_additive() && a.op.op == OpKind::RemoveConstraint {
                    (b, a)
                } else {
                    continue;
                };

                if addition.op.value.to_lowercase() != removal.op.value.to_lowercase() {
                    continue;
                }

                conflicts.push(Conflict {
                    target: target.to_string(),
                    value: addition.op.value.clone(),
                    addition: ConflictSide::from(*addition),
                    removal: ConflictSide::from(*removal),
                    resolution: CONFLICT_RESOLUTION.to_string(),
                });
            }
        }
    }
    conflicts
}

/// Stable sort by the role's position in `priority`; unlisted roles go
/// last in their original relative order
pub fn apply_priority_order(mut ops: Vec<TaggedOp>, priority: &[String]) -> Vec<TaggedOp> {
    ops.sort_by_key(|op| {
        priority
            .iter()
            .position(|role| role == &op.role)
            .unwrap_or(priority.len())
    });
    ops
}

/// Highest severity among the ops (`nit` when there are none)
pub fn severity_max(ops: &[TaggedOp]) -> Severity {
    ops.iter()
        .map(|op| op.severity)
        .max()
        .unwrap_or(Severity::Nit)
}

/// Merge critiques into one ordered edit plan
pub fn merge_critiques(critiques: &[Critique], priority: &[String]) -> MergeResult {
    let extracted = extract_ops(critiques);

    if extracted.is_empty() && critiques.iter().all(|c| c.no_issues) {
        return MergeResult {
            no_changes: true,
            ..MergeResult::default()
        };
    }

    let deduped = deduplicate_ops(extracted);
    let conflicts = detect_conflicts(&deduped);
    let ops = apply_priority_order(deduped, priority);
    let severity_max = severity_max(&ops);

    debug!(
        "Merged {} critiques into {} ops ({} conflicts, max severity {})",
        critiques.len(),
        ops.len(),
        conflicts.len(),
        severity_max
    );

    MergeResult {
        ops,
        conflicts,
        severity_max,
        no_changes: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::critique::{CritiqueFinding, SuggestedOp};

    fn op(kind: OpKind, target: &str, value: &str) -> SuggestedOp {
        SuggestedOp {
            op: kind,
            target: target.into(),
            value: value.into(),
            original: None,
        }
    }

    fn critique(role: &str, findings: Vec<(&str, Severity, Vec<SuggestedOp>)>) -> Critique {
        Critique {
            reviewer_role: role.into(),
            findings: findings
                .into_iter()
                .map(|(id, severity, ops)| CritiqueFinding {
                    id: id.into(),
                    severity,
                    confidence: 0.8,
                    issue: format!("issue {}", id),
                    suggested_ops: ops,
                })
                .collect(),
            score: None,
            no_issues: false,
        }
    }

    /// Critique with one finding carrying one op
    fn single(role: &str, id: &str, severity: Severity, op: SuggestedOp) -> Critique {
        critique(role, vec![(id, severity, vec![op])])
    }

    fn roles(ops: &[TaggedOp]) -> Vec<&str> {
        ops.iter().map(|o| o.role.as_str()).collect()
    }

    // ── extract_ops ───────────────────────────────────────────────────────────

    #[test]
    fn test_extract_ops_tags_origin() {
        let critiques = vec![critique(
            "security",
            vec![(
                "s1",
                Severity::Major,
                vec![
                    op(OpKind::AddGuardrail, "constraints", "No secrets"),
                    op(OpKind::AddContext, "context", "Data is PII"),
                ],
            )],
        )];
        let ops = extract_ops(&critiques);
        assert_eq!(ops.len(), 2);
        assert!(ops.iter().all(|o| o.role == "security" && o.finding_id == "s1"));
        assert_eq!(ops[0].severity, Severity::Major);
        assert_eq!(ops[0].confidence, 0.8);
        assert_eq!(ops[1].issue, "issue s1");
    }

    // ── deduplicate_ops ───────────────────────────────────────────────────────

    #[test]
    fn test_dedup_keeps_first_on_equal_severity() {
        let critiques = vec![
            single("clarity", "c1", Severity::Minor, op(OpKind::Reword, "task", "Be brief")),
            single("style", "t1", Severity::Minor, op(OpKind::Reword, "task", "Be brief")),
        ];
        let ops = deduplicate_ops(extract_ops(&critiques));
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].role, "clarity");
    }

    #[test]
    fn test_dedup_higher_severity_replaces_in_place() {
        let critiques = vec![
            critique(
                "clarity",
                vec![
                    ("c1", Severity::Nit, vec![op(OpKind::AddConstraint, "output", "JSON only")]),
                    ("c2", Severity::Minor, vec![op(OpKind::Clarify, "task", "Who reads this")]),
                ],
            ),
            single(
                "security",
                "s1",
                Severity::Blocker,
                op(OpKind::AddConstraint, "output", "JSON only"),
            ),
        ];
        let ops = deduplicate_ops(extract_ops(&critiques));
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].role, "security");
        assert_eq!(ops[0].finding_id, "s1");
        assert_eq!(ops[1].finding_id, "c2");
    }

    #[test]
    fn test_dedup_distinguishes_values() {
        let critiques = vec![critique(
            "clarity",
            vec![(
                "c1",
                Severity::Minor,
                vec![
                    op(OpKind::AddConstraint, "output", "JSON only"),
                    op(OpKind::AddConstraint, "output", "json only"),
                ],
            )],
        )];
        assert_eq!(deduplicate_ops(extract_ops(&critiques)).len(), 2);
    }

    // ── detect_conflicts ──────────────────────────────────────────────────────

    #[test]
    fn test_conflict_detected_case_insensitively() {
        let critiques = vec![
            single("security", "s1", Severity::Major, op(OpKind::AddGuardrail, "x", "No secrets")),
            single(
                "brevity",
                "b1",
                Severity::Minor,
                op(OpKind::RemoveConstraint, "x", "no secrets"),
            ),
        ];
        let conflicts = detect_conflicts(&extract_ops(&critiques));
        assert_eq!(conflicts.len(), 1);
        let conflict = &conflicts[0];
        assert_eq!(conflict.target, "x");
        assert_eq!(conflict.addition.role, "security");
        assert_eq!(conflict.removal.role, "brevity");
        assert_eq!(conflict.resolution, CONFLICT_RESOLUTION);
    }

    #[test]
    fn test_conflict_detected_when_removal_comes_first() {
        let critiques = vec![
            single(
                "brevity",
                "b1",
                Severity::Minor,
                op(OpKind::RemoveConstraint, "x", "Cite sources"),
            ),
            single(
                "accuracy",
                "a1",
                Severity::Major,
                op(OpKind::AddConstraint, "x", "cite SOURCES"),
            ),
        ];
        let conflicts = detect_conflicts(&extract_ops(&critiques));
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].addition.role, "accuracy");
        assert_eq!(conflicts[0].removal.finding_id, "b1");
    }

    #[test]
    fn test_no_conflict_across_targets_or_values() {
        let critiques = vec![
            single("security", "s1", Severity::Major, op(OpKind::AddGuardrail, "x", "No secrets")),
            critique(
                "brevity",
                vec![(
                    "b1",
                    Severity::Minor,
                    vec![
                        op(OpKind::RemoveConstraint, "y", "No secrets"),
                        op(OpKind::RemoveConstraint, "x", "Be polite"),
                    ],
                )],
            ),
        ];
        assert!(detect_conflicts(&extract_ops(&critiques)).is_empty());
    }

    #[test]
    fn test_two_additions_do_not_conflict() {
        let critiques = vec![
            single("a", "a1", Severity::Minor, op(OpKind::AddGuardrail, "x", "v")),
            single("b", "b1", Severity::Minor, op(OpKind::AddConstraint, "x", "V")),
        ];
        assert!(detect_conflicts(&extract_ops(&critiques)).is_empty());
    }

    // ── apply_priority_order ──────────────────────────────────────────────────

    #[test]
    fn test_priority_order_puts_unlisted_last() {
        let critiques = vec![
            single("clarity", "c1", Severity::Minor, op(OpKind::Reword, "a", "1")),
            single("security", "s1", Severity::Minor, op(OpKind::Reword, "b", "2")),
            single("testing", "t1", Severity::Minor, op(OpKind::Reword, "c", "3")),
        ];
        let priority = vec!["security".to_string(), "testing".to_string()];
        let ordered = apply_priority_order(extract_ops(&critiques), &priority);
        assert_eq!(roles(&ordered), vec!["security", "testing", "clarity"]);
    }

    #[test]
    fn test_priority_order_is_stable_for_unlisted_roles() {
        let critiques = vec![
            single("zeta", "z1", Severity::Minor, op(OpKind::Reword, "a", "1")),
            single("alpha", "a1", Severity::Minor, op(OpKind::Reword, "b", "2")),
            single("security", "s1", Severity::Minor, op(OpKind::Reword, "c", "3")),
            single("zeta", "z2", Severity::Minor, op(OpKind::Reword, "d", "4")),
        ];
        let ordered = apply_priority_order(extract_ops(&critiques), &["security".to_string()]);
        let ids: Vec<&str> = ordered.iter().map(|o| o.finding_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "z1", "a1", "z2"]);
    }

    // ── severity_max / merge_critiques ────────────────────────────────────────

    #[test]
    fn test_severity_max_defaults_to_nit() {
        assert_eq!(severity_max(&[]), Severity::Nit);
    }

    #[test]
    fn test_merge_all_clean_is_no_changes() {
        let critiques = vec![
            Critique::clean("security", Some(9.0)),
            Critique::clean("clarity", Some(8.5)),
        ];
        let result = merge_critiques(&critiques, &[]);
        assert!(result.no_changes);
        assert!(result.ops.is_empty());
        assert!(result.conflicts.is_empty());
        assert_eq!(result.severity_max, Severity::Nit);
    }

    #[test]
    fn test_merge_findings_without_ops_is_not_no_changes() {
        let critiques = vec![critique("clarity", vec![("c1", Severity::Major, vec![])])];
        let result = merge_critiques(&critiques, &[]);
        assert!(!result.no_changes);
        assert!(result.ops.is_empty());
    }

    #[test]
    fn test_merge_full_pipeline() {
        let critiques = vec![
            critique(
                "clarity",
                vec![(
                    "c1",
                    Severity::Minor,
                    vec![op(OpKind::RemoveConstraint, "rules", "Never guess")],
                )],
            ),
            critique(
                "security",
                vec![
                    (
                        "s1",
                        Severity::Blocker,
                        vec![op(OpKind::AddGuardrail, "rules", "never guess")],
                    ),
                    ("s2", Severity::Minor, vec![op(OpKind::Reword, "task", "Be precise")]),
                ],
            ),
            single("testing", "t1", Severity::Major, op(OpKind::Reword, "task", "Be precise")),
            Critique::clean("style", None),
        ];
        let priority = vec!["security".to_string(), "testing".to_string()];
        let result = merge_critiques(&critiques, &priority);

        assert!(!result.no_changes);
        assert_eq!(result.severity_max, Severity::Blocker);
        // testing's duplicate reword outranks security's and takes its slot
        let ids: Vec<&str> = result.ops.iter().map(|o| o.finding_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "t1", "c1"]);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].winner(&priority), "security");

        let findings = result.findings_detail();
        assert_eq!(findings.len(), 3);
        assert_eq!(findings[0].reviewer_role, "security");
        assert_eq!(findings[0].op, OpKind::AddGuardrail);
    }
}
