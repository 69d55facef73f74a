// Weight-change log — append-only JSONL, one entry per adaptation

use fs2::FileExt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::types::WeightHistoryEntry;
use crate::errors::{AuditError, AuditResult};

/// Uncapped audit trail of weight changes
#[derive(Debug, Clone)]
pub struct WeightChangeLog {
    path: PathBuf,
}

impl WeightChangeLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry
    pub fn append(&self, entry: &WeightHistoryEntry) -> AuditResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| AuditError::persistence(parent, e))?;
        }
        let line = serde_json::to_string(entry)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AuditError::persistence(&self.path, e))?;
        file.lock_exclusive()
            .map_err(|e| AuditError::persistence(&self.path, e))?;
        let written = writeln!(file, "{}", line);
        if let Err(e) = file.unlock() {
            warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
        written.map_err(|e| AuditError::persistence(&self.path, e))?;

        debug!("Logged weight change to {}", self.path.display());
        Ok(())
    }

    /// Read entries oldest first; `limit` keeps only the most recent ones.
    /// Unparseable lines are skipped.
    pub fn read(&self, limit: Option<usize>) -> AuditResult<Vec<WeightHistoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents =
            fs::read_to_string(&self.path).map_err(|e| AuditError::persistence(&self.path, e))?;

        let mut entries: Vec<WeightHistoryEntry> = contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(idx, line)| match serde_json::from_str(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping weight log line {}: {}", idx + 1, e);
                    None
                }
            })
            .collect();

        if let Some(limit) = limit {
            if entries.len() > limit {
                entries.drain(..entries.len() - limit);
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn entry(days: u32) -> WeightHistoryEntry {
        WeightHistoryEntry {
            timestamp: Utc::now(),
            weights_before: BTreeMap::new(),
            weights_after: BTreeMap::new(),
            precision_at_change: BTreeMap::new(),
            measurement_period_days: days,
        }
    }

    #[test]
    fn test_append_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let log = WeightChangeLog::new(dir.path().join("nested/weights.jsonl"));
        log.append(&entry(7)).unwrap();
        log.append(&entry(14)).unwrap();

        let entries = log.read(None).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].measurement_period_days, 7);
        assert_eq!(entries[1].measurement_period_days, 14);
    }

    #[test]
    fn test_read_limit_keeps_most_recent() {
        let dir = tempfile::tempdir().unwrap();
        let log = WeightChangeLog::new(dir.path().join("weights.jsonl"));
        for days in 1..=5 {
            log.append(&entry(days)).unwrap();
        }
        let entries = log.read(Some(2)).unwrap();
        let days: Vec<u32> = entries.iter().map(|e| e.measurement_period_days).collect();
        assert_eq!(days, vec![4, 5]);
    }

    #[test]
    fn test_read_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = WeightChangeLog::new(dir.path().join("weights.jsonl"));
        log.append(&entry(30)).unwrap();
        let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
        writeln!(file, "oops").unwrap();

        assert_eq!(log.read(None).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_log_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = WeightChangeLog::new(dir.path().join("absent.jsonl"));
        assert!(log.read(None).unwrap().is_empty());
    }
}
