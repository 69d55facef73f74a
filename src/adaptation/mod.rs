// Adaptation module
// Suggests and applies reviewer weight changes from reflection metrics,
// keeps the weight-change log, and benchmarks weightings against outcomes

mod benchmark;
mod controller;
mod history;
mod types;

pub use benchmark::{run_benchmark, BenchmarkReport, WeightingSummary};
pub use controller::{
    compute_weight_suggestions, AdaptationController, MAX_WEIGHT, MIN_WEIGHT, REASON_DECREASE,
    REASON_HOLD, REASON_INCREASE,
};
pub use history::WeightChangeLog;
pub use types::{AdaptationPreview, ApplyOutcome, WeightHistoryEntry, WeightSuggestion};
