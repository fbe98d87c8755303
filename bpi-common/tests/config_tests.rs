//! Unit tests for configuration resolution and validation
//!
//! Uses serial_test to prevent ENV variable race conditions.
//! Tests that manipulate BPI_* variables are marked with #[serial].

use bpi_common::config::{IngestConfig, CONFIG_ENV_VAR};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;

/// Collects formatted log lines
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn clear_env() {
    for name in [
        CONFIG_ENV_VAR,
        "BPI_DATASET_PATH",
        "BPI_STORE_URL",
        "BPI_EASY_IMPORT_PROJECT_NAME_LENGTH",
        "BPI_ENABLE_AUTO_IMPORT_SCAN",
        "BPI_CATALOG_PUBLIC_KEY",
        "BPI_CATALOG_TIMEOUT_SECS",
        "BPI_SHUTDOWN_TIMEOUT_SECS",
        "BPI_LOG_LEVEL",
    ] {
        env::remove_var(name);
    }
}

#[test]
fn test_defaults_match_documented_values() {
    let config = IngestConfig::default();

    assert_eq!(config.dataset_path, PathBuf::from("/dataset"));
    assert_eq!(config.processed_files_cache_key, "bpi:processed_files");
    assert_eq!(config.import_lock_key, "bpi:import_lock");
    assert_eq!(config.import_lock_ttl_secs, 1800);
    assert!(!config.enable_auto_import_scan);
    assert_eq!(config.easy_import_project_name_offset, 0);
    assert_eq!(config.easy_import_project_name_length, 12);
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = IngestConfig::from_toml_str(
        r#"
        dataset_path = "/mnt/datasets"
        easy_import_project_name_offset = 3

        [catalog]
        host = "https://catalog.example.org"
        "#,
    )
    .unwrap();

    assert_eq!(config.dataset_path, PathBuf::from("/mnt/datasets"));
    assert_eq!(config.easy_import_project_name_offset, 3);
    assert_eq!(config.easy_import_project_name_length, 12);
    assert_eq!(config.catalog.host, "https://catalog.example.org");
    assert_eq!(config.catalog.timeout_secs, 30);
}

#[test]
fn test_malformed_toml_is_config_error() {
    let err = IngestConfig::from_toml_str("dataset_path = [").unwrap_err();
    assert!(err.to_string().contains("Configuration error"));
}

#[test]
fn test_zero_name_length_rejected() {
    let config = IngestConfig {
        easy_import_project_name_length: 0,
        ..IngestConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("absent.toml");

    let (config, source) = IngestConfig::load(Some(&missing)).unwrap();
    assert_eq!(config.import_lock_key, "bpi:import_lock");
    assert!(!source.found);
    assert_eq!(source.path, missing);
}

#[test]
#[serial]
fn test_missing_file_warning_reaches_subscriber() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("absent.toml");
    let (_, source) = IngestConfig::load(Some(&missing)).unwrap();

    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();
    tracing::subscriber::with_default(subscriber, || source.log());

    let output = logs.contents();
    assert!(output.contains("WARN"));
    assert!(output.contains("Config file not found"));
    assert!(output.contains("absent.toml"));
}

#[test]
#[serial]
fn test_env_overrides_toml() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        "dataset_path = \"/from/toml\"\nstore_url = \"memory://\"\n",
    )
    .unwrap();

    env::set_var("BPI_DATASET_PATH", "/from/env");
    env::set_var("BPI_ENABLE_AUTO_IMPORT_SCAN", "true");
    env::set_var("BPI_CATALOG_PUBLIC_KEY", "pub");

    let (config, source) = IngestConfig::load(Some(&path)).unwrap();
    assert!(source.found);
    assert_eq!(config.dataset_path, PathBuf::from("/from/env"));
    assert_eq!(config.store_url, "memory://");
    assert!(config.enable_auto_import_scan);
    assert_eq!(config.catalog.public_key.as_deref(), Some("pub"));

    clear_env();
}

#[test]
#[serial]
fn test_config_env_var_selects_file() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("other.toml");
    std::fs::write(&path, "import_lock_key = \"custom:lock\"\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &path);
    let (config, _) = IngestConfig::load(None).unwrap();
    assert_eq!(config.import_lock_key, "custom:lock");

    clear_env();
}

#[test]
#[serial]
fn test_invalid_env_number_is_error() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    env::set_var("BPI_EASY_IMPORT_PROJECT_NAME_LENGTH", "twelve");

    let result = IngestConfig::load(Some(&temp_dir.path().join("none.toml")));
    assert!(result.is_err());

    clear_env();
}

#[test]
#[serial]
fn test_env_overrides_timeouts_and_log_level() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        "shutdown_timeout_secs = 9\n[catalog]\ntimeout_secs = 10\n[logging]\nlevel = \"warn\"\n",
    )
    .unwrap();

    env::set_var("BPI_SHUTDOWN_TIMEOUT_SECS", "2");
    env::set_var("BPI_CATALOG_TIMEOUT_SECS", "45");
    env::set_var("BPI_LOG_LEVEL", "debug");

    let (config, _) = IngestConfig::load(Some(&path)).unwrap();
    assert_eq!(config.shutdown_timeout_secs, 2);
    assert_eq!(config.catalog.timeout_secs, 45);
    assert_eq!(config.logging.level, "debug");

    env::set_var("BPI_CATALOG_TIMEOUT_SECS", "soon");
    assert!(IngestConfig::load(Some(&path)).is_err());

    clear_env();
}
