//! Integration test for file logging.
//!
//! Environment variables used:
//! - LOG_MODE: "stdout" (default) or "file"
//! - LOG_LEVEL: log level ("trace", "debug", "info", "warn", "error"); default is "info"
//! - LOG_DATA_DIR: when using file mode, the directory of the log files (default "./logs")
//! - LOG_MAX_SIZE: size in bytes after which the next index is used
//!   Refer to `src/logging/mod.rs` for more details.
use chrono::Utc;
use log::info;
use postman_relayer::logging::{resolve_log_file, rolled_file_name, setup_logging, LoggingError};
use std::{env, fs, sync::Mutex};
use tempfile::TempDir;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

// The global logger can only be installed once per process, so a single test owns it.
#[test]
fn test_file_logging_writes_to_the_dated_file() {
    let _guard = ENV_MUTEX
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    env::set_var("LOG_MODE", "file");
    env::set_var("LOG_LEVEL", "debug");
    env::set_var("LOG_DATA_DIR", temp_dir.path());
    env::remove_var("LOG_MAX_SIZE");

    setup_logging().expect("logger should install");
    info!("integration log line: messageHash=0x01");

    let date = Utc::now().format("%Y-%m-%d").to_string();
    let log_path = temp_dir.path().join(rolled_file_name("relayer.log", &date, 1));
    let content = fs::read_to_string(&log_path).expect("log file should exist");
    assert!(content.contains("integration log line: messageHash=0x01"));

    assert!(matches!(setup_logging(), Err(LoggingError::Init(_))));

    for var in ["LOG_MODE", "LOG_LEVEL", "LOG_DATA_DIR"] {
        env::remove_var(var);
    }
}

#[test]
fn test_full_files_roll_over_to_the_next_index() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let date = "2024-02-29";

    let first = resolve_log_file(temp_dir.path(), date, 10);
    assert!(first.ends_with("relayer-2024-02-29.1.log"));

    fs::write(&first, "0123456789abcdef").unwrap();
    let second = resolve_log_file(temp_dir.path(), date, 10);
    assert!(second.ends_with("relayer-2024-02-29.2.log"));

    // A file still under the limit keeps being used.
    fs::write(&second, "0123").unwrap();
    assert_eq!(resolve_log_file(temp_dir.path(), date, 10), second);
}
