// Project-wide constants
//
// Centralised here so file names and tuning defaults have one source of
// truth. Import via `use crate::config::constants::*;`.

/// Environment variable that relocates the data directory (default `~/.jury`)
pub const HOME_ENV_VAR: &str = "JURY_HOME";

/// Data directory name under the user's home
pub const DATA_DIR_NAME: &str = ".jury";

/// Config file name inside the data directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Audit partitions live in this subdirectory
pub const AUDIT_DIR_NAME: &str = "audit";

/// Append-only weight-change log
pub const WEIGHT_LOG_FILE_NAME: &str = "weight_changes.jsonl";

/// Precision at or above which a reviewer counts as high-precision
pub const DEFAULT_PRECISION_THRESHOLD: f64 = 0.70;

/// Outcome-bearing reviews needed before weights are adapted
pub const DEFAULT_MIN_REVIEWS: usize = 5;

/// Default measurement window for reflection and adaptation
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// Weight snapshots kept inside the config (oldest dropped first)
pub const WEIGHT_HISTORY_CAP: usize = 10;
