use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Weekday;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("invalid cleanup weekday {0:?} (expected e.g. \"thu\")")]
    Weekday(String),
}

/// Runtime configuration, read once at startup from a RON file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Feed endpoint receiving the plugin form POST.
    pub feed_endpoint: String,
    /// Plugin identifier the feed keys its response on.
    pub plugin_key: String,
    #[serde(default = "default_feed_rows")]
    pub feed_rows: u32,
    /// Diff page URL with a `{pageid}` placeholder.
    pub diff_url_template: String,
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    #[serde(default = "default_pics_dir")]
    pub pics_dir: PathBuf,
    /// Share endpoint of the social platform.
    pub publish_endpoint: String,
    pub access_token: String,
    #[serde(default = "default_renderer_binary")]
    pub renderer_binary: PathBuf,
    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,
    /// Weekday name for the weekly picture cleanup.
    #[serde(default = "default_cleanup_weekday")]
    pub cleanup_weekday: String,
    #[serde(default = "default_cleanup_hour")]
    pub cleanup_hour: u32,
}

fn default_feed_rows() -> u32 {
    100
}

fn default_store_path() -> PathBuf {
    PathBuf::from("dedup_store.json")
}

fn default_pics_dir() -> PathBuf {
    PathBuf::from("pics")
}

fn default_renderer_binary() -> PathBuf {
    PathBuf::from("wkhtmltoimage")
}

/// Main cycle cadence: 1h2m.
fn default_cycle_interval_secs() -> u64 {
    62 * 60
}

fn default_cleanup_weekday() -> String {
    "thu".to_string()
}

fn default_cleanup_hour() -> u32 {
    4
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        ron::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn cleanup_weekday(&self) -> Result<Weekday, ConfigError> {
        self.cleanup_weekday
            .parse()
            .map_err(|_| ConfigError::Weekday(self.cleanup_weekday.clone()))
    }
}
