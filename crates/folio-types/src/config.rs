//! Configuration loading for folio.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/folio/config.{toml,yaml,json}.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::FolioError;

/// A `(filename, title)` pair used to populate an empty store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedEntry {
    pub filename: String,
    pub title: String,
}

impl SeedEntry {
    pub fn new(filename: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            title: title.into(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to RocksDB storage directory
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Directory holding the PDF files named by the seed list
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,

    /// Remote replica URL; sync is skipped when unset
    #[serde(default)]
    pub sync_endpoint: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Maximum hits returned per search
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Run the indexing pipeline during startup
    #[serde(default = "default_index_on_startup")]
    pub index_on_startup: bool,

    /// Documents imported into an empty store on first run
    #[serde(default = "default_seed")]
    pub seed: Vec<SeedEntry>,
}

fn default_db_path() -> String {
    ProjectDirs::from("", "", "folio")
        .map(|p| p.data_local_dir().join("db"))
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .to_string()
}

fn default_assets_dir() -> String {
    "./assets".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_search_limit() -> usize {
    50
}

fn default_index_on_startup() -> bool {
    true
}

fn default_seed() -> Vec<SeedEntry> {
    vec![SeedEntry::new("dummy.pdf", "PDF 01")]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            assets_dir: default_assets_dir(),
            sync_endpoint: None,
            log_level: default_log_level(),
            search_limit: default_search_limit(),
            index_on_startup: default_index_on_startup(),
            seed: default_seed(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/folio/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (FOLIO_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, FolioError> {
        let config_dir = ProjectDirs::from("", "", "folio")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())
            .map_err(|e| FolioError::Config(e.to_string()))?
            .set_default("assets_dir", default_assets_dir())
            .map_err(|e| FolioError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| FolioError::Config(e.to_string()))?
            .set_default("search_limit", default_search_limit() as i64)
            .map_err(|e| FolioError::Config(e.to_string()))?
            .set_default("index_on_startup", default_index_on_startup())
            .map_err(|e| FolioError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // FOLIO_DB_PATH, FOLIO_SYNC_ENDPOINT, FOLIO_LOG_LEVEL, ...
        builder = builder.add_source(
            Environment::with_prefix("FOLIO")
                .prefix_separator("_")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| FolioError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| FolioError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), FolioError> {
        if self.search_limit == 0 {
            return Err(FolioError::Config("search_limit must be > 0".to_string()));
        }
        let mut filenames: Vec<&str> = self.seed.iter().map(|s| s.filename.as_str()).collect();
        filenames.sort_unstable();
        let before = filenames.len();
        filenames.dedup();
        if filenames.len() != before {
            return Err(FolioError::Config(
                "seed filenames must be unique".to_string(),
            ));
        }
        Ok(())
    }

    /// Expand ~ in db_path to actual home directory
    pub fn expanded_db_path(&self) -> PathBuf {
        expand_home(&self.db_path)
    }

    /// Expand ~ in assets_dir to actual home directory
    pub fn expanded_assets_dir(&self) -> PathBuf {
        expand_home(&self.assets_dir)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}
