//! Logging system configuration and initialization
//!
//! - Console output and optional non-blocking file output
//! - Level and per-module filters from configuration, `RUST_LOG` wins
//! - Optional JSON format for the file layer
//! - Local-time timestamps
//! - Removal of old log files beyond the configured count

#![allow(clippy::uninlined_format_args)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use lazy_static::lazy_static;
use tracing::{info, warn};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;
use crate::infrastructure::config::ConfigManager;

lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<WorkerGuard>> = Mutex::new(Vec::new());
}

/// Timestamps in the machine's local time zone
struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f %:z"))
    }
}

/// Resolve the log directory: the configured one, else `<data dir>/markup-scraper/logs`,
/// else `logs` next to the executable.
pub fn get_log_directory(config: &LoggingConfig) -> PathBuf {
    if let Some(dir) = &config.log_dir {
        return dir.clone();
    }

    ConfigManager::get_app_data_dir()
        .map(|dir| dir.join("logs"))
        .unwrap_or_else(|_| {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(Path::to_path_buf))
                .unwrap_or_default()
                .join("logs")
        })
}

/// Initialize the logging system with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(LoggingConfig::default())
}

/// Initialize logging with custom configuration
///
/// `RUST_LOG` overrides the configured filters entirely:
/// ```bash
/// RUST_LOG="debug,html5ever=trace" scrape_sanity buffer page.html
/// ```
///
/// Fails if a global subscriber is already installed.
pub fn init_logging_with_config(config: LoggingConfig) -> Result<()> {
    let (config_filter, rejected) = config_filter(&config);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or(config_filter);
    let registry = Registry::default().with(env_filter);

    let log_dir = get_log_directory(&config);
    let mut removed = 0;

    match (config.file_output, config.console_output) {
        (true, console) => {
            std::fs::create_dir_all(&log_dir)
                .with_context(|| format!("Failed to create log directory {:?}", log_dir))?;
            removed = cleanup_old_logs(&log_dir, config.max_files)?;

            let file_appender = rolling::never(&log_dir, &config.file_name);
            let (file_writer, file_guard) = non_blocking(file_appender);
            LOG_GUARDS
                .lock()
                .map_err(|_| anyhow!("Log guard registry poisoned"))?
                .push(file_guard);

            // The console layer's type depends on the layers below it, so each arm builds its own
            if config.json_format {
                let file_layer = fmt::Layer::new()
                    .json()
                    .with_writer(file_writer)
                    .with_timer(LocalTimeFormatter)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false);
                let console_layer = console.then(|| {
                    fmt::Layer::new()
                        .with_writer(std::io::stdout)
                        .with_timer(LocalTimeFormatter)
                        .with_target(false)
                });
                registry.with(file_layer).with(console_layer).try_init()?;
            } else {
                let file_layer = fmt::Layer::new()
                    .with_writer(file_writer)
                    .with_timer(LocalTimeFormatter)
                    .with_target(true)
                    .with_ansi(false);
                let console_layer = console.then(|| {
                    fmt::Layer::new()
                        .with_writer(std::io::stdout)
                        .with_timer(LocalTimeFormatter)
                        .with_target(false)
                });
                registry.with(file_layer).with(console_layer).try_init()?;
            }
        }
        (false, true) => {
            let console_layer = fmt::Layer::new()
                .with_writer(std::io::stdout)
                .with_timer(LocalTimeFormatter)
                .with_target(false);
            registry.with(console_layer).try_init()?;
        }
        (false, false) => {
            return Err(anyhow!("No logging output configured"));
        }
    }

    info!("Logging system initialized");
    info!("Log level: {}", config.level);
    if config.file_output {
        info!("Log file: {:?}", log_dir.join(&config.file_name));
        if removed > 0 {
            info!("Removed {} old log files (keeping {})", removed, config.max_files);
        }
    }
    for directive in rejected {
        warn!("Ignoring invalid module filter: {}", directive);
    }

    Ok(())
}

/// Filter built from configuration alone, plus the module directives that failed to parse
fn config_filter(config: &LoggingConfig) -> (EnvFilter, Vec<String>) {
    let mut filter = EnvFilter::new(&config.level);
    let mut rejected = Vec::new();

    let mut directives: Vec<String> = config
        .module_filters
        .iter()
        .map(|(module, level)| format!("{}={}", module, level))
        .collect();
    directives.sort();
    directives.push(format!("markup_scraper={}", config.level));

    for directive in directives {
        match directive.parse() {
            Ok(parsed) => filter = filter.add_directive(parsed),
            Err(_) => rejected.push(directive),
        }
    }

    (filter, rejected)
}

/// Delete the oldest `*.log` files in `log_dir` so at most `max_files` remain.
/// Returns the number of files removed.
pub fn cleanup_old_logs(log_dir: &Path, max_files: u32) -> Result<usize> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let mut log_files = Vec::new();
    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_log = path.extension().is_some_and(|ext| ext == "log");
        if path.is_file() && is_log {
            if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
                log_files.push((path, modified));
            }
        }
    }

    // Newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (path, _) in log_files.iter().skip(max_files as usize) {
        match std::fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove old log file {:?}: {}", path, e),
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_log_dir_wins() {
        let config = LoggingConfig {
            log_dir: Some(PathBuf::from("/tmp/scraper-logs")),
            ..Default::default()
        };
        assert_eq!(get_log_directory(&config), PathBuf::from("/tmp/scraper-logs"));
    }

    #[test]
    fn test_default_log_dir_ends_with_logs() {
        let log_dir = get_log_directory(&LoggingConfig::default());
        assert!(log_dir.ends_with("logs"));
    }

    #[test]
    fn test_config_filter_includes_module_directives() {
        let (filter, rejected) = config_filter(&LoggingConfig::default());
        assert!(rejected.is_empty());
        let rendered = filter.to_string().to_lowercase();
        assert!(rendered.contains("html5ever=warn"));
        assert!(rendered.contains("markup_scraper=info"));
    }

    #[test]
    fn test_config_filter_rejects_bad_directive() {
        let mut config = LoggingConfig::default();
        config
            .module_filters
            .insert("reqwest".to_string(), "loud".to_string());
        let (_, rejected) = config_filter(&config);
        assert_eq!(rejected, vec!["reqwest=loud".to_string()]);
    }

    #[test]
    fn test_cleanup_keeps_newest_log_files() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..4 {
            std::fs::write(dir.path().join(format!("run-{i}.log")), "x").unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        let removed = cleanup_old_logs(dir.path(), 2).unwrap();
        assert_eq!(removed, 2);

        let remaining: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(remaining.len(), 3);
        assert!(dir.path().join("notes.txt").exists());
    }

    // The only test in this crate that installs the global subscriber
    #[test]
    fn test_init_plain_file_and_console_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            file_output: true,
            console_output: true,
            json_format: false,
            log_dir: Some(dir.path().to_path_buf()),
            file_name: "scraper-test.log".to_string(),
            ..Default::default()
        };

        init_logging_with_config(config.clone()).unwrap();
        assert!(dir.path().join("scraper-test.log").exists());

        // A second subscriber is refused instead of panicking
        assert!(init_logging_with_config(config).is_err());
    }

    #[test]
    fn test_cleanup_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(cleanup_old_logs(&dir.path().join("absent"), 1).unwrap(), 0);
    }
}
