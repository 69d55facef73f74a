// Audit module
// Tamper-evident, date-partitioned record store for review cycles

pub mod integrity;
mod store;
mod types;

pub use integrity::{compute_hash, hash_prompt, stamp, verify, verify_value};
pub use store::{
    parse_line, AuditStore, LineStatus, OutcomeUpdate, PartitionReport, PartitionScan,
};
pub(crate) use store::write_atomic;
pub use types::{
    AuditRecord, Finding, OpKind, Outcome, ReviewCycle, ReviewerStats, Severity,
};
