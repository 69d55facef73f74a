// Configuration module
// Public interface for configuration loading

pub mod constants;
mod loader;
mod settings;

pub use loader::{data_dir, default_config_path, ConfigStore};
pub use settings::{Config, MergeConfig, PathsConfig, ReflectionConfig, ScoringConfig};
