// Configuration loader
// Loads and persists ~/.jury/config.toml (or $JURY_HOME/config.toml)

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::constants::*;
use super::settings::Config;

/// Resolve the data directory: `$JURY_HOME`, else `~/.jury`
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(HOME_ENV_VAR) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(DATA_DIR_NAME))
}

/// Default config file path
pub fn default_config_path() -> Result<PathBuf> {
    Ok(data_dir()?.join(CONFIG_FILE_NAME))
}

/// Reads and rewrites one configuration file.
///
/// Rewrites hold an exclusive lock on a sidecar `.lock` file for the whole
/// read-modify-write and land via temp file + rename.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory that relative paths in the config resolve against
    pub fn base_dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Load the config; a missing file yields defaults
    pub fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            debug!("No config at {}, using defaults", self.path.display());
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read config from {}", self.path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", self.path.display()))?;

        config
            .validate()
            .context("Configuration validation failed")?;

        Ok(config)
    }

    /// Write the whole config (atomic write)
    pub fn save(&self, config: &Config) -> Result<()> {
        self.with_lock(|| self.write(config))
    }

    /// Locked read-modify-write. The closure's result is returned once the
    /// new config is durable.
    pub fn update<T>(&self, f: impl FnOnce(&mut Config) -> Result<T>) -> Result<T> {
        self.with_lock(|| {
            let mut config = self.load()?;
            let out = f(&mut config)?;
            self.write(&config)?;
            Ok(out)
        })
    }

    fn write(&self, config: &Config) -> Result<()> {
        let toml = toml::to_string_pretty(config).context("Failed to serialize config")?;
        crate::audit::write_atomic(&self.path, &toml)
            .with_context(|| format!("Failed to write config to {}", self.path.display()))?;
        Ok(())
    }

    fn with_lock<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory {}", parent.display())
                })?;
            }
        }

        let lock_path = self.path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file {}", lock_path.display()))?;
        lock_file
            .lock_exclusive()
            .with_context(|| format!("Failed to lock {}", lock_path.display()))?;

        let result = f();

        if let Err(e) = lock_file.unlock() {
            warn!("Failed to release lock {}: {}", lock_path.display(), e);
        }
        result
    }
}
