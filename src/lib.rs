// jury - audit, reflection and adaptive weighting for prompt reviewers
// Library exports

pub mod adaptation;
pub mod audit;
pub mod cli;
pub mod config;
pub mod critique;
pub mod errors;
pub mod reflection;

pub use errors::{AuditError, AuditResult, IntegrityError};
