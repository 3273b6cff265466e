pub mod check;
pub mod config_cmd;
pub mod serve;

use discovery_config::AppConfig;
use std::path::{Path, PathBuf};

pub fn default_config_path() -> PathBuf {
    AppConfig::config_dir().join("config.toml")
}

/// Load `path` with environment overrides applied.
pub fn load_config(path: &Path) -> Result<AppConfig, Box<dyn std::error::Error>> {
    AppConfig::load_with_env(path).map_err(|e| format!("Failed to load config: {e}").into())
}
