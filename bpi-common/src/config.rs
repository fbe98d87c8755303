//! Configuration loading for the ingest service
//!
//! One [`IngestConfig`] is built at startup and shared by reference with every
//! component. Resolution priority, highest first:
//! 1. Command-line argument (applied by the binary)
//! 2. Environment variable (`BPI_*`)
//! 3. TOML config file
//! 4. Compiled default
//!
//! A missing TOML file is not fatal: defaults apply and the caller logs a
//! warning through [`ConfigSource`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "BPI_CONFIG";

/// Catalog platform connection settings (service account)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Base URL of the catalog platform core
    pub host: String,
    /// Service account public key
    pub public_key: Option<String>,
    /// Service account private key
    pub private_key: Option<String>,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            host: "http://cytomine.local".to_string(),
            public_key: None,
            private_key: None,
            timeout_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level for the ingest crates (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Complete ingest service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Dataset root; its immediate subdirectories are buckets
    pub dataset_path: PathBuf,
    /// Upload root; its immediate subdirectories hold staged symlinks
    pub root: PathBuf,
    /// Staging area where symlinks to imported files are created
    pub writing_path: PathBuf,
    /// Directory holding the `BP.<structure>.xsd` schema files
    pub schema_dir: PathBuf,
    /// Shared fingerprint/lock store (`sqlite://<path>` or `memory://`)
    pub store_url: String,
    /// Namespace of the processed-files fingerprint cache
    pub processed_files_cache_key: String,
    /// Name of the cross-process import lock
    pub import_lock_key: String,
    /// Lock expiry, a safety net against crashed holders
    pub import_lock_ttl_secs: u64,
    /// Run the background auto-import scanner
    pub enable_auto_import_scan: bool,
    /// Seconds between scanner cycles
    pub auto_import_scan_interval_secs: u64,
    /// Start of the project-name window inside a file stem (characters)
    pub easy_import_project_name_offset: usize,
    /// Length of the project-name window (characters)
    pub easy_import_project_name_length: usize,
    pub catalog: CatalogConfig,
    /// HTTP listen address for manual triggers
    pub listen_addr: String,
    /// Bound on waiting for the scanner to stop at shutdown
    pub shutdown_timeout_secs: u64,
    pub logging: LoggingConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("/dataset"),
            root: PathBuf::from("/data/bpi"),
            writing_path: PathBuf::from("/data/bpi/tmp"),
            schema_dir: PathBuf::from("/opt/bpi/schemas"),
            store_url: "sqlite:///data/bpi/bpi-shared.db".to_string(),
            processed_files_cache_key: "bpi:processed_files".to_string(),
            import_lock_key: "bpi:import_lock".to_string(),
            import_lock_ttl_secs: 1800,
            enable_auto_import_scan: false,
            auto_import_scan_interval_secs: 60,
            easy_import_project_name_offset: 0,
            easy_import_project_name_length: 12,
            catalog: CatalogConfig::default(),
            listen_addr: "0.0.0.0:5000".to_string(),
            shutdown_timeout_secs: 5,
            logging: LoggingConfig::default(),
        }
    }
}

/// Config file a [`IngestConfig`] was resolved from
///
/// Loading happens before the tracing subscriber exists, so the outcome is
/// returned and reported with [`ConfigSource::log`] once logging is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// False when the file was absent and defaults were used
    pub found: bool,
}

impl ConfigSource {
    pub fn log(&self) {
        if self.found {
            info!("Loaded config from {}", self.path.display());
        } else {
            warn!(
                "Config file not found at {}, using defaults",
                self.path.display()
            );
        }
    }
}

impl IngestConfig {
    /// Load configuration: TOML file (if any), then `BPI_*` overrides, then validate
    ///
    /// `explicit_path` wins over `BPI_CONFIG`, which wins over the platform default.
    pub fn load(explicit_path: Option<&Path>) -> Result<(Self, ConfigSource)> {
        let path = match explicit_path {
            Some(p) => p.to_path_buf(),
            None => match std::env::var(CONFIG_ENV_VAR) {
                Ok(p) => PathBuf::from(p),
                Err(_) => default_config_path(),
            },
        };

        let found = path.exists();
        let mut config = if found {
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok((config, ConfigSource { path, found }))
    }

    /// Parse a TOML config file (no env overrides, no validation)
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse TOML text; absent keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Apply `BPI_*` environment variables on top of the current values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_string("BPI_DATASET_PATH") {
            self.dataset_path = PathBuf::from(v);
        }
        if let Some(v) = env_string("BPI_ROOT") {
            self.root = PathBuf::from(v);
        }
        if let Some(v) = env_string("BPI_WRITING_PATH") {
            self.writing_path = PathBuf::from(v);
        }
        if let Some(v) = env_string("BPI_SCHEMA_DIR") {
            self.schema_dir = PathBuf::from(v);
        }
        if let Some(v) = env_string("BPI_STORE_URL") {
            self.store_url = v;
        }
        if let Some(v) = env_string("BPI_PROCESSED_FILES_CACHE_KEY") {
            self.processed_files_cache_key = v;
        }
        if let Some(v) = env_string("BPI_IMPORT_LOCK_KEY") {
            self.import_lock_key = v;
        }
        if let Some(v) = env_parse("BPI_IMPORT_LOCK_TTL_SECS")? {
            self.import_lock_ttl_secs = v;
        }
        if let Some(v) = env_parse("BPI_ENABLE_AUTO_IMPORT_SCAN")? {
            self.enable_auto_import_scan = v;
        }
        if let Some(v) = env_parse("BPI_AUTO_IMPORT_SCAN_INTERVAL_SECS")? {
            self.auto_import_scan_interval_secs = v;
        }
        if let Some(v) = env_parse("BPI_EASY_IMPORT_PROJECT_NAME_OFFSET")? {
            self.easy_import_project_name_offset = v;
        }
        if let Some(v) = env_parse("BPI_EASY_IMPORT_PROJECT_NAME_LENGTH")? {
            self.easy_import_project_name_length = v;
        }
        if let Some(v) = env_string("BPI_CATALOG_HOST") {
            self.catalog.host = v;
        }
        if let Some(v) = env_string("BPI_CATALOG_PUBLIC_KEY") {
            self.catalog.public_key = Some(v);
        }
        if let Some(v) = env_string("BPI_CATALOG_PRIVATE_KEY") {
            self.catalog.private_key = Some(v);
        }
        if let Some(v) = env_parse("BPI_CATALOG_TIMEOUT_SECS")? {
            self.catalog.timeout_secs = v;
        }
        if let Some(v) = env_string("BPI_LISTEN_ADDR") {
            self.listen_addr = v;
        }
        if let Some(v) = env_parse("BPI_SHUTDOWN_TIMEOUT_SECS")? {
            self.shutdown_timeout_secs = v;
        }
        if let Some(v) = env_string("BPI_LOG_LEVEL") {
            self.logging.level = v.trim().to_string();
        }
        Ok(())
    }

    /// Reject values the ingest components cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.easy_import_project_name_length == 0 {
            return Err(Error::Config(
                "easy_import_project_name_length must be greater than 0".to_string(),
            ));
        }
        if self.auto_import_scan_interval_secs == 0 {
            return Err(Error::Config(
                "auto_import_scan_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.import_lock_ttl_secs == 0 {
            return Err(Error::Config(
                "import_lock_ttl_secs must be greater than 0".to_string(),
            ));
        }
        if self.store_url.trim().is_empty() {
            return Err(Error::Config("store_url must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.auto_import_scan_interval_secs)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.import_lock_ttl_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Platform default config file location
///
/// `<config_dir>/bpi/config.toml` when it exists, else `/etc/bpi/config.toml`.
pub fn default_config_path() -> PathBuf {
    if let Some(user_config) = dirs::config_dir().map(|d| d.join("bpi").join("config.toml")) {
        if user_config.exists() {
            return user_config;
        }
    }
    PathBuf::from("/etc/bpi/config.toml")
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{} has invalid value '{}': {}", name, raw, e))),
        None => Ok(None),
    }
}
