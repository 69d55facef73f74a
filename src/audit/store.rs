// Audit store — date-partitioned JSONL audit trail
//
// One file per UTC date (`YYYY-MM-DD.jsonl`), one record per line. Appends
// and rewrites of a partition hold an exclusive advisory lock on a sidecar
// `.YYYY-MM-DD.lock` file; rewrites go through a temp file and a rename.

use chrono::NaiveDate;
use fs2::FileExt;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::integrity::{self, HASH_FIELD};
use super::types::{AuditRecord, Outcome};
use crate::errors::{AuditError, AuditResult, IntegrityError};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DEFAULT_REJECTION_REASON: &str = "unknown";

/// Fields an outcome report rewrites
const OUTCOME_FIELDS: [&str; 5] = [
    "outcome",
    "suggestions_accepted",
    "suggestions_rejected",
    "rejection_details",
    "reviewer_stats",
];

/// Records read from one partition, with the lines that did not make it
#[derive(Debug, Default)]
pub struct PartitionScan {
    pub records: Vec<AuditRecord>,
    /// Lines that are not valid JSON or do not match the record schema
    pub malformed: usize,
    /// Records whose integrity hash failed verification
    pub skipped: usize,
}

/// Integrity status of a single line (for `jury verify`)
#[derive(Debug, Clone, PartialEq)]
pub enum LineStatus {
    Valid,
    Unhashed,
    Tampered(IntegrityError),
    Malformed(String),
}

/// Per-line verification report for one partition
#[derive(Debug, Clone)]
pub struct PartitionReport {
    pub date: NaiveDate,
    pub lines: Vec<(usize, LineStatus)>,
}

impl PartitionReport {
    pub fn count(&self, pred: impl Fn(&LineStatus) -> bool) -> usize {
        self.lines.iter().filter(|(_, s)| pred(s)).count()
    }

    pub fn is_clean(&self) -> bool {
        self.lines
            .iter()
            .all(|(_, s)| matches!(s, LineStatus::Valid | LineStatus::Unhashed))
    }
}

/// Outcome report handed in by a collaborator once a review is resolved
#[derive(Debug, Clone, Default)]
pub struct OutcomeUpdate {
    pub accepted_ids: Vec<String>,
    pub rejected_ids: Vec<String>,
    /// Explicit rejection reasons; when `None` every rejected id gets "unknown"
    pub rejection_reasons: Option<BTreeMap<String, String>>,
}

/// Append-only audit trail rooted at a directory
#[derive(Debug, Clone)]
pub struct AuditStore {
    log_dir: PathBuf,
}

impl AuditStore {
    /// Create a store, creating the log directory if it doesn't exist
    pub fn new(log_dir: PathBuf) -> AuditResult<Self> {
        fs::create_dir_all(&log_dir).map_err(|e| AuditError::persistence(&log_dir, e))?;
        Ok(Self { log_dir })
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Path of the partition for a date
    pub fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.log_dir
            .join(format!("{}.jsonl", date.format(DATE_FORMAT)))
    }

    fn lock_path(&self, date: NaiveDate) -> PathBuf {
        self.log_dir
            .join(format!(".{}.lock", date.format(DATE_FORMAT)))
    }

    /// Run `f` while holding the partition's exclusive lock
    fn with_partition_lock<T>(
        &self,
        date: NaiveDate,
        f: impl FnOnce() -> AuditResult<T>,
    ) -> AuditResult<T> {
        let lock_path = self.lock_path(date);
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| AuditError::persistence(&lock_path, e))?;
        lock_file
            .lock_exclusive()
            .map_err(|e| AuditError::persistence(&lock_path, e))?;

        let result = f();

        if let Err(e) = lock_file.unlock() {
            warn!("Failed to release lock {}: {}", lock_path.display(), e);
        }
        result
    }

    /// Stamp the record's hash and append it to its date partition.
    ///
    /// Returns the partition path written to.
    pub fn append(&self, record: &mut AuditRecord) -> AuditResult<PathBuf> {
        integrity::stamp(record)?;
        let line = serde_json::to_string(record)?;
        let date = record.timestamp.date_naive();
        let path = self.partition_path(date);

        self.with_partition_lock(date, || {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| AuditError::persistence(&path, e))?;
            writeln!(file, "{}", line).map_err(|e| AuditError::persistence(&path, e))?;
            Ok(())
        })?;

        debug!(
            "Appended audit record {} to {}",
            record.prompt_hash,
            path.display()
        );
        Ok(path)
    }

    /// Append, logging instead of failing. Audit logging must never abort
    /// the review pipeline that produced the record.
    pub fn append_best_effort(&self, record: &mut AuditRecord) -> bool {
        match self.append(record) {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to append audit record: {}", e);
                false
            }
        }
    }

    /// Record the outcome of a pending review.
    ///
    /// Updates the first pending record in the date's partition whose
    /// `prompt_hash` matches. Candidates failing verification are left
    /// untouched and the scan continues. Returns whether a record changed.
    pub fn update_outcome(
        &self,
        date: NaiveDate,
        prompt_hash: &str,
        outcome: Outcome,
        update: &OutcomeUpdate,
    ) -> AuditResult<bool> {
        if outcome.is_pending() {
            return Err(AuditError::InvalidTransition(outcome));
        }

        let path = self.partition_path(date);
        self.with_partition_lock(date, || {
            if !path.exists() {
                return Ok(false);
            }
            let contents =
                fs::read_to_string(&path).map_err(|e| AuditError::persistence(&path, e))?;

            let mut lines: Vec<String> = contents.lines().map(str::to_string).collect();
            let mut updated = false;

            for (idx, line) in lines.iter_mut().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let value: Value = match serde_json::from_str(line) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("Skipping malformed line {} in {}: {}", idx + 1, path.display(), e);
                        continue;
                    }
                };
                let is_candidate = value.get("prompt_hash").and_then(Value::as_str)
                    == Some(prompt_hash)
                    && value.get("outcome").and_then(Value::as_str)
                        == Some(Outcome::Pending.as_str());
                if !is_candidate {
                    continue;
                }

                if let Err(e) = integrity::verify_value(&value) {
                    warn!(
                        "Refusing to update record on line {} of {}: {}",
                        idx + 1,
                        path.display(),
                        e
                    );
                    continue;
                }

                let mut record: AuditRecord = match serde_json::from_value(value.clone()) {
                    Ok(r) => r,
                    Err(e) => {
                        warn!("Record on line {} does not match schema: {}", idx + 1, e);
                        continue;
                    }
                };

                apply_outcome(&mut record, outcome, update);
                let resolved = resolve_raw(value, &record)?;
                *line = resolved.to_string();
                updated = true;
                break;
            }

            if updated {
                let mut body = lines.join("\n");
                body.push('\n');
                write_atomic(&path, &body)?;
                info!(
                    "Recorded outcome '{}' for {} in {}",
                    outcome,
                    prompt_hash,
                    path.display()
                );
            }
            Ok(updated)
        })
    }

    /// Read one partition, strictly: lines that fail to parse or fail
    /// integrity verification are counted and left out.
    pub fn load_partition(&self, date: NaiveDate) -> AuditResult<PartitionScan> {
        let path = self.partition_path(date);
        let mut scan = PartitionScan::default();
        if !path.exists() {
            return Ok(scan);
        }

        let contents = fs::read_to_string(&path).map_err(|e| AuditError::persistence(&path, e))?;
        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(idx + 1, line) {
                Ok(record) => scan.records.push(record),
                Err(AuditError::Integrity(e)) => {
                    warn!("Skipping record on line {} of {}: {}", idx + 1, path.display(), e);
                    scan.skipped += 1;
                }
                Err(e) => {
                    debug!("{} ({})", e, path.display());
                    scan.malformed += 1;
                }
            }
        }
        Ok(scan)
    }

    /// Verify every line of a partition without filtering anything out
    pub fn verify_partition(&self, date: NaiveDate) -> AuditResult<PartitionReport> {
        let path = self.partition_path(date);
        let mut report = PartitionReport {
            date,
            lines: Vec::new(),
        };
        if !path.exists() {
            return Ok(report);
        }

        let contents = fs::read_to_string(&path).map_err(|e| AuditError::persistence(&path, e))?;
        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let status = match serde_json::from_str::<Value>(line) {
                Err(e) => LineStatus::Malformed(e.to_string()),
                Ok(value) => match integrity::verify_value(&value) {
                    Ok(()) => LineStatus::Valid,
                    Err(IntegrityError::NoHash) => LineStatus::Unhashed,
                    Err(e) => LineStatus::Tampered(e),
                },
            };
            report.lines.push((idx + 1, status));
        }
        Ok(report)
    }

    /// Dates that have a partition file, oldest first
    pub fn partition_dates(&self) -> AuditResult<Vec<NaiveDate>> {
        let entries =
            fs::read_dir(&self.log_dir).map_err(|e| AuditError::persistence(&self.log_dir, e))?;

        let mut dates: Vec<NaiveDate> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name();
                let name = name.to_str()?;
                let stem = name.strip_suffix(".jsonl")?;
                NaiveDate::parse_from_str(stem, DATE_FORMAT).ok()
            })
            .collect();
        dates.sort();
        Ok(dates)
    }
}

/// Parse-or-reject a single log line. Records carrying a hash are verified
/// on the raw JSON before the typed parse; unhashed records are accepted.
pub fn parse_line(line_no: usize, line: &str) -> AuditResult<AuditRecord> {
    let value: Value = serde_json::from_str(line).map_err(|source| AuditError::Malformed {
        line: line_no,
        source,
    })?;

    if value.get(HASH_FIELD).is_some() {
        integrity::verify_value(&value)?;
    }

    serde_json::from_value(value).map_err(|source| AuditError::Malformed {
        line: line_no,
        source,
    })
}

/// Mutate a pending record into its resolved state (hash not touched)
fn apply_outcome(record: &mut AuditRecord, outcome: Outcome, update: &OutcomeUpdate) {
    record.outcome = outcome;
    record.suggestions_accepted = update.accepted_ids.clone();
    record.suggestions_rejected = update.rejected_ids.clone();
    // Only rejected ids get an entry; ids without a reason are "unknown"
    record.rejection_details = update
        .rejected_ids
        .iter()
        .map(|id| {
            let reason = update
                .rejection_reasons
                .as_ref()
                .and_then(|reasons| reasons.get(id))
                .map_or(DEFAULT_REJECTION_REASON, String::as_str);
            (id.clone(), reason.to_string())
        })
        .collect();
    record.recompute_reviewer_stats();
}

/// Carry the outcome fields of `record` into the raw line it was read from
/// and re-hash it. Fields the typed record does not model stay as they were.
fn resolve_raw(mut raw: Value, record: &AuditRecord) -> AuditResult<Value> {
    let typed = serde_json::to_value(record)?;
    if let (Value::Object(raw_map), Value::Object(typed_map)) = (&mut raw, &typed) {
        for field in OUTCOME_FIELDS {
            match typed_map.get(field) {
                Some(v) => raw_map.insert(field.to_string(), v.clone()),
                None => raw_map.remove(field),
            };
        }
    }
    let hash = integrity::compute_value_hash(&raw);
    if let Value::Object(raw_map) = &mut raw {
        raw_map.insert(HASH_FIELD.to_string(), Value::String(hash));
    }
    Ok(raw)
}

/// Write `contents` to `path` via a sibling temp file and a rename
pub(crate) fn write_atomic(path: &Path, contents: &str) -> AuditResult<()> {
    let temp_path = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));

    let write = || -> std::io::Result<()> {
        let mut file = File::create(&temp_path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        Ok(())
    };
    if let Err(e) = write() {
        let _ = fs::remove_file(&temp_path);
        return Err(AuditError::persistence(&temp_path, e));
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        AuditError::persistence(path, e)
    })
}
