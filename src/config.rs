use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{wlog_debug, Error, Result};

/// Exit destination used when a route does not name one.
pub const DEFAULT_EXIT: &str = "home";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Override for the progress file location (`~` is expanded).
    pub progress_file: Option<String>,
    /// Exit destination for routes without `exitTo`.
    pub default_exit: Option<String>,
    /// Drop a workflow's progress record once it is completed.
    #[serde(default)]
    pub clear_on_complete: bool,
    /// Upper bound for a page initializer; slower ones count as failed.
    pub init_timeout_ms: Option<u64>,
}

impl Config {
    /// Base directory: `$WAYPOINT_HOME`, else `~/.waypoint`.
    pub fn home_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("WAYPOINT_HOME") {
            if !dir.is_empty() {
                return Ok(expand_tilde(&dir));
            }
        }
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".waypoint"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::home_dir()?.join("waypoint.toml"))
    }

    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::home_dir()?.join("waypoint.log"))
    }

    pub fn progress_path(&self) -> Result<PathBuf> {
        match &self.progress_file {
            Some(file) => Ok(expand_tilde(file)),
            None => Ok(Self::home_dir()?.join("progress.json")),
        }
    }

    pub fn effective_exit(&self) -> &str {
        self.default_exit.as_deref().unwrap_or(DEFAULT_EXIT)
    }

    pub fn init_timeout(&self) -> Option<Duration> {
        self.init_timeout_ms.map(Duration::from_millis)
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        wlog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            wlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        wlog_debug!(
            "Config loaded: progress_file={:?} default_exit={:?} clear_on_complete={} init_timeout_ms={:?}",
            config.progress_file,
            config.default_exit,
            config.clear_on_complete,
            config.init_timeout_ms
        );
        Ok(config)
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
