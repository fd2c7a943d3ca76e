//! Configuration: `timetable.toml` plus `TIMETABLE_*` environment overrides

use crate::error::{Error, Result};
use crate::loader::{GridOptions, SourceLocator};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "timetable.toml";
pub const DEFAULT_DB_PATH: &str = "timetable.db";
pub const DEFAULT_HISTORY_PATH: &str = "timetable-history.json";
pub const DEFAULT_INTERVAL_SECS: u64 = 12 * 60 * 60;
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Top-level config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimetableConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub layout: MetadataLayout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Direct CSV URL
    pub url: Option<String>,
    /// Id of a sheet published to the web
    pub sheet_id: Option<String>,
    /// Local CSV export
    pub path: Option<PathBuf>,
    #[serde(default = "default_skip_rows")]
    pub skip_rows: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: None,
            sheet_id: None,
            path: None,
            skip_rows: default_skip_rows(),
        }
    }
}

impl SourceConfig {
    /// Resolve the configured locator: url, then sheet id, then path
    pub fn locator(&self) -> Result<SourceLocator> {
        if let Some(url) = &self.url {
            return Ok(SourceLocator::Url(url.clone()));
        }
        if let Some(id) = &self.sheet_id {
            return Ok(SourceLocator::published_sheet(id));
        }
        if let Some(path) = &self.path {
            return Ok(SourceLocator::Path(path.clone()));
        }
        Err(Error::Config(
            "no source configured (set source.url, source.sheet_id or source.path)".to_string(),
        ))
    }

    pub fn grid_options(&self) -> GridOptions {
        GridOptions {
            skip_rows: self.skip_rows,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds between passes in `watch` mode
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,
    /// Newest entries kept in the history journal
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            history_path: default_history_path(),
            history_limit: default_history_limit(),
        }
    }
}

/// Fixed column positions of the shared metadata block.
///
/// Every group shares these columns; group columns start at
/// `first_group_column`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataLayout {
    pub day_column: usize,
    pub lesson_column: usize,
    pub week_type_column: usize,
    /// Start time on the primary row, end time on the secondary row
    pub time_column: usize,
    pub first_group_column: usize,
}

impl Default for MetadataLayout {
    fn default() -> Self {
        Self {
            day_column: 1,
            lesson_column: 2,
            week_type_column: 3,
            time_column: 4,
            first_group_column: 5,
        }
    }
}

impl TimetableConfig {
    /// Load config from `path` (or `timetable.toml`), then apply env overrides.
    ///
    /// A missing file is not an error; defaults and env still apply.
    /// Nested keys use a double underscore: `TIMETABLE_SOURCE__SHEET_ID`.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let path = path.unwrap_or(DEFAULT_CONFIG_PATH);
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(path))
                .merge(Env::prefixed("TIMETABLE_").split("__")),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        figment.extract().map_err(|e| Error::Config(e.to_string()))
    }
}

fn default_skip_rows() -> usize {
    GridOptions::default().skip_rows
}

fn default_db_path() -> PathBuf {
    PathBuf::from(DEFAULT_DB_PATH)
}

fn default_history_path() -> PathBuf {
    PathBuf::from(DEFAULT_HISTORY_PATH)
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}
