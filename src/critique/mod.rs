// Critique module
//
// Merges reviewer critiques into a single edit plan: deduplicated ops,
// add-vs-remove conflicts, reviewer priority order, aggregate severity and
// the weighted composite score that goes into the audit record.

pub mod merger;
pub mod scoring;
pub mod types;

pub use merger::{
    apply_priority_order, deduplicate_ops, detect_conflicts, extract_ops, merge_critiques,
    severity_max,
};
pub use scoring::{compute_composite_score, round_to, weighted_composite, CompositeScore};
pub use types::{
    Conflict, ConflictSide, Critique, CritiqueFinding, MergeResult, SuggestedOp, TaggedOp,
};
