// Record integrity — SHA-256 over a canonical, sorted-key JSON form
//
// The digest covers every field except `integrity_hash` itself. Keys are
// sorted recursively before serializing so the digest does not depend on
// struct field order or on serde_json's map implementation.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::types::AuditRecord;
use crate::errors::{AuditResult, IntegrityError};

pub const HASH_FIELD: &str = "integrity_hash";

/// Recursively rebuild objects with their keys in sorted order
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, inner) in entries {
                sorted.insert(key, sort_keys(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Canonical serialization of a JSON record with the hash field excluded
pub fn canonical_json(value: &Value) -> String {
    let mut stripped = value.clone();
    if let Value::Object(map) = &mut stripped {
        map.remove(HASH_FIELD);
    }
    sort_keys(stripped).to_string()
}

fn digest(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Digest of a raw JSON record (as read from a log line)
pub fn compute_value_hash(value: &Value) -> String {
    digest(&canonical_json(value))
}

/// Digest of a typed record
pub fn compute_hash(record: &AuditRecord) -> AuditResult<String> {
    let value = serde_json::to_value(record)?;
    Ok(compute_value_hash(&value))
}

/// Recompute and store the record's hash
pub fn stamp(record: &mut AuditRecord) -> AuditResult<()> {
    let hash = compute_hash(record)?;
    record.integrity_hash = Some(hash);
    Ok(())
}

/// Verify a raw JSON record. Fields this version does not model are still
/// covered, so verification happens before the typed parse.
pub fn verify_value(value: &Value) -> Result<(), IntegrityError> {
    let stored = match value.get(HASH_FIELD).and_then(Value::as_str) {
        Some(hash) if !hash.is_empty() => hash,
        _ => return Err(IntegrityError::NoHash),
    };

    let computed = compute_value_hash(value);
    if computed == stored {
        Ok(())
    } else {
        Err(IntegrityError::HashMismatch {
            stored: stored.to_string(),
            computed,
        })
    }
}

/// Verify a typed record
pub fn verify(record: &AuditRecord) -> Result<(), IntegrityError> {
    let stored = match record.integrity_hash.as_deref() {
        Some(hash) if !hash.is_empty() => hash,
        _ => return Err(IntegrityError::NoHash),
    };

    // A record that cannot be serialized cannot match any digest
    let computed = compute_hash(record).unwrap_or_default();
    if computed == stored {
        Ok(())
    } else {
        Err(IntegrityError::HashMismatch {
            stored: stored.to_string(),
            computed,
        })
    }
}

/// SHA-256 of the prompt text, used as the record's `prompt_hash`
pub fn hash_prompt(prompt: &str) -> String {
    digest(prompt)
}
