//! Logging setup driven by environment variables.
//!
//! - `LOG_MODE`: `stdout` (default) or `file`
//! - `LOG_LEVEL`: `trace`, `debug`, `info` (default), `warn` or `error`
//! - `LOG_DATA_DIR`: directory of the log files in file mode, `./logs` by default
//! - `LOG_MAX_SIZE`: size in bytes after which a new file is started, 1GB by default
//!
//! In file mode a new `relayer-<date>.<index>.log` is used every day, and the index grows
//! while the current file exceeds `LOG_MAX_SIZE`.
use std::{
    env,
    fs::{create_dir_all, metadata, OpenOptions},
    path::{Path, PathBuf},
    str::FromStr,
};

use chrono::Utc;
use log::info;
use simplelog::{Config, LevelFilter, SimpleLogger, WriteLogger};
use strum::{Display, EnumString};
use thiserror::Error;

const LOG_FILE_NAME: &str = "relayer.log";
const DEFAULT_LOG_MAX_SIZE: u64 = 1_073_741_824;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Log file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Logger already initialized: {0}")]
    Init(#[from] log::SetLoggerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogMode {
    Stdout,
    File,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub mode: LogMode,
    pub level: LevelFilter,
    pub data_dir: PathBuf,
    pub max_size: u64,
}

impl LoggingConfig {
    /// Unknown or malformed values fall back to their defaults.
    pub fn from_env() -> Self {
        Self {
            mode: env::var("LOG_MODE")
                .ok()
                .and_then(|v| LogMode::from_str(&v).ok())
                .unwrap_or(LogMode::Stdout),
            level: env::var("LOG_LEVEL")
                .ok()
                .and_then(|v| LevelFilter::from_str(&v).ok())
                .unwrap_or(LevelFilter::Info),
            data_dir: PathBuf::from(
                env::var("LOG_DATA_DIR").unwrap_or_else(|_| "./logs".to_string()),
            ),
            max_size: env::var("LOG_MAX_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_LOG_MAX_SIZE),
        }
    }
}

/// `relayer.log` becomes `relayer-<date>.<index>.log`.
pub fn rolled_file_name(base_name: &str, date: &str, index: u32) -> String {
    let stem = base_name.strip_suffix(".log").unwrap_or(base_name);
    format!("{}-{}.{}.log", stem, date, index)
}

/// First file of the day in `dir` that is still under `max_size` bytes.
pub fn resolve_log_file(dir: &Path, date: &str, max_size: u64) -> PathBuf {
    let mut index = 1;
    loop {
        let candidate = dir.join(rolled_file_name(LOG_FILE_NAME, date, index));
        match metadata(&candidate) {
            Ok(meta) if meta.len() > max_size => index += 1,
            _ => return candidate,
        }
    }
}

/// Installs the global logger.
pub fn setup_logging() -> Result<(), LoggingError> {
    let config = LoggingConfig::from_env();

    match config.mode {
        LogMode::File => {
            create_dir_all(&config.data_dir)?;
            let date = Utc::now().format("%Y-%m-%d").to_string();
            let path = resolve_log_file(&config.data_dir, &date, config.max_size);
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            WriteLogger::init(config.level, Config::default(), file)?;
            info!("Logging to file: path={}", path.display());
        }
        LogMode::Stdout => SimpleLogger::init(config.level, Config::default())?,
    }

    info!(
        "Logging is successfully configured: mode={} level={}",
        config.mode, config.level
    );
    Ok(())
}
