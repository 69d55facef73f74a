// Error taxonomy for the audit trail
//
// Integrity and parse failures are local to a single record and are counted
// by callers rather than aborting a batch. Persistence failures carry the
// path that failed so the CLI can point at it.

use std::path::PathBuf;
use thiserror::Error;

use crate::audit::Outcome;

/// Why a record failed integrity verification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    #[error("record has no integrity hash")]
    NoHash,

    #[error("integrity hash mismatch (stored {stored}, computed {computed})")]
    HashMismatch { stored: String, computed: String },
}

/// Errors raised by the record store
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("malformed audit record on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error("failed to serialize audit record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to persist {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot transition a record to {0:?}; only pending records accept an outcome")]
    InvalidTransition(Outcome),
}

impl AuditError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AuditError::Persistence {
            path: path.into(),
            source,
        }
    }
}

pub type AuditResult<T> = std::result::Result<T, AuditError>;
