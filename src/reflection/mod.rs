// Reflection module
// Windowed statistics over the audit trail: how often each reviewer's
// suggestions were accepted, and how often that coincided with a good outcome

mod aggregator;

pub use aggregator::{
    aggregate, compute_metrics, partition_by_precision, Aggregator, LoadedWindow,
    ReflectionReport, ReviewerMetrics,
};
