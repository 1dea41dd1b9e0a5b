//! Configuration infrastructure
//!
//! Settings are grouped by concern (search, HTTP, logging). Every section has
//! defaults, so a config file only needs the values it overrides. Files are
//! layered with `SCRAPER__SECTION__KEY` environment variables.

#![allow(clippy::uninlined_format_args)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::infrastructure::http_client::HttpClientConfig;

/// Complete scraper configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Tree search tuning
    pub search: SearchConfig,

    /// HTTP client used for URI targets
    pub http: HttpClientConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Which node kinds are reported as search candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalPolicy {
    /// Only element nodes can match
    #[default]
    Elements,
    /// Element and text nodes can match
    ElementsAndText,
}

/// Search engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of workers draining the shared work stack
    pub max_workers: usize,

    /// Capacity of the result channel between workers and the consumer
    pub result_buffer: usize,

    /// Candidate node kinds
    pub traversal: TraversalPolicy,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_workers: defaults::SEARCH_MAX_WORKERS,
            result_buffer: defaults::SEARCH_RESULT_BUFFER,
            traversal: TraversalPolicy::default(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Directory for log files; defaults to `<data dir>/markup-scraper/logs`
    pub log_dir: Option<PathBuf>,

    /// Log file name
    pub file_name: String,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,

    /// Module-specific log level filters (e.g., "html5ever": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: None,
            file_name: defaults::LOG_FILE_NAME.to_string(),
            max_files: defaults::LOG_MAX_FILES,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("html5ever".to_string(), "warn".to_string());
                filters.insert("selectors".to_string(), "warn".to_string());
                filters.insert("reqwest".to_string(), "info".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("tokio".to_string(), "info".to_string());
                filters
            },
        }
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);

        Ok(config_dir)
    }

    /// Get application data directory
    pub fn get_app_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .context("Failed to get user data directory")?
            .join(defaults::APP_DIR_NAME);

        Ok(data_dir)
    }

    /// Manager for the default config file location
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join(defaults::CONFIG_FILE_NAME);
        Ok(Self { config_path })
    }

    /// Manager for an explicit config file
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Load configuration: defaults, then the JSON file if present, then
    /// `SCRAPER__*` environment overrides.
    pub fn load_config(&self) -> Result<ScraperConfig> {
        let loaded = load_layered(&self.config_path, defaults::ENV_PREFIX)?;
        info!("Loaded configuration from: {:?}", self.config_path);
        Ok(loaded)
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &ScraperConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }
}

fn load_layered(path: &Path, env_prefix: &str) -> Result<ScraperConfig> {
    let baseline = config::Config::try_from(&ScraperConfig::default())
        .context("Failed to serialize default configuration")?;

    let settings = config::Config::builder()
        .add_source(baseline)
        .add_source(
            config::File::from(path)
                .format(config::FileFormat::Json)
                .required(false),
        )
        .add_source(
            config::Environment::with_prefix(env_prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

    settings
        .try_deserialize()
        .context("Configuration file contains invalid settings")
}

/// Default configuration values
pub mod defaults {
    /// Directory name used under the user's config and data directories
    pub const APP_DIR_NAME: &str = "markup-scraper";

    /// Config file name inside the config directory
    pub const CONFIG_FILE_NAME: &str = "scraper_config.json";

    /// Environment variable prefix (`SCRAPER__SEARCH__MAX_WORKERS=8`)
    pub const ENV_PREFIX: &str = "SCRAPER";

    /// Default number of search workers
    pub const SEARCH_MAX_WORKERS: usize = 4;

    /// Default result channel capacity
    pub const SEARCH_RESULT_BUFFER: usize = 64;

    /// Default user agent
    pub const USER_AGENT: &str = "markup-scraper/0.2";

    /// Default request timeout in seconds
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    /// Default request rate limit
    pub const MAX_REQUESTS_PER_SECOND: u32 = 5;

    /// Default log level
    pub const LOG_LEVEL: &str = "info";

    /// Default JSON format setting
    pub const LOG_JSON_FORMAT: bool = false;

    /// Default console output setting
    pub const LOG_CONSOLE_OUTPUT: bool = true;

    /// Default file output setting
    pub const LOG_FILE_OUTPUT: bool = false;

    /// Default log file name
    pub const LOG_FILE_NAME: &str = "markup-scraper.log";

    /// Default maximum log files to keep
    pub const LOG_MAX_FILES: u32 = 5;
}
