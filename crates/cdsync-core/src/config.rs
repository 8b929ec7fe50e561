//! Configuration module for cdsync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Default file pattern: common still-image and camera raw extensions.
pub const DEFAULT_FILE_PATTERN: &str =
    r"\.(bmp|gif|jpeg|jpg|png|raw|tif|tiff|cr2|crw|dng|srf)$";

/// Top-level configuration for cdsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub transfer: TransferConfig,
    pub scan: ScanConfig,
    pub drive: DriveConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// What to sync and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Local directory to scan.
    pub path: PathBuf,
    /// Regular expression over file names (matched case-insensitively).
    pub file_pattern: String,
    /// Compute the plan without any mutating remote call.
    pub dry_run: bool,
    /// Compare MD5 checksums when matching files.
    pub checksum: bool,
    /// Delete remote files that have no local counterpart.
    pub delete: bool,
}

/// Concurrency and retry settings for hashing and transfers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub parallel_checksum: usize,
    pub parallel_uploads: usize,
    pub parallel_deletes: usize,
    /// Retries after the first failed upload attempt.
    pub upload_retries: u32,
    /// Retries after the first failed delete attempt.
    pub delete_retries: u32,
    /// Backoff before the first retry, doubled on every further attempt.
    pub retry_base_delay_ms: u64,
    /// Upper bound for a single backoff delay.
    pub retry_max_delay_ms: u64,
}

/// Local scan settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Maximum concurrent `lstat` calls while expanding a directory.
    pub max_concurrent: usize,
}

/// Cloud drive endpoints and request settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub token_url: String,
    pub authorize_url: String,
    /// Returns the account's metadata and content endpoints.
    pub discovery_url: String,
    /// Redirect URI registered for the interactive login.
    pub redirect_uri: String,
    /// Nodes requested per listing page (the service caps this at 200).
    pub page_size: u32,
    /// Label attached to every folder and file created by cdsync.
    pub folder_label: String,
    /// Listing filter for remote files.
    pub file_filter: String,
}

/// OAuth client credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Long-lived refresh token. `None` falls back to the keyring entry
    /// written by `cdsync auth login`.
    pub refresh_token: Option<String>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/cdsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("cdsync")
            .join("config.yaml")
    }
}

impl SyncConfig {
    /// Compile [`file_pattern`](Self::file_pattern) case-insensitively.
    pub fn compiled_pattern(&self) -> Result<Regex, regex::Error> {
        RegexBuilder::new(&self.file_pattern)
            .case_insensitive(true)
            .build()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            path: dirs::picture_dir()
                .or_else(|| dirs::home_dir().map(|h| h.join("Pictures")))
                .unwrap_or_else(|| PathBuf::from("~/Pictures")),
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
            dry_run: false,
            checksum: true,
            delete: false,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            parallel_checksum: 5,
            parallel_uploads: 5,
            parallel_deletes: 5,
            upload_retries: 2,
            delete_retries: 2,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 30_000,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { max_concurrent: 20 }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            token_url: "https://api.amazon.com/auth/o2/token".to_string(),
            authorize_url: "https://www.amazon.com/ap/oa".to_string(),
            discovery_url: "https://drive.amazonaws.com/drive/v1/account/endpoint".to_string(),
            redirect_uri: "http://127.0.0.1:8500/login/cb".to_string(),
            page_size: 200,
            folder_label: "image-sync".to_string(),
            file_filter: "kind:FILE AND contentProperties.contentType:(image*)".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"transfer.parallel_uploads"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Largest page the listing endpoint accepts.
const MAX_PAGE_SIZE: u32 = 200;

fn positive(errors: &mut Vec<ValidationError>, field: &str, value: usize) {
    if value == 0 {
        errors.push(ValidationError {
            field: field.into(),
            message: "must be greater than 0".into(),
        });
    }
}

fn parses_as_url(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if let Err(e) = url::Url::parse(value) {
        errors.push(ValidationError {
            field: field.into(),
            message: format!("invalid URL '{value}': {e}"),
        });
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "sync.path".into(),
                message: "must not be empty".into(),
            });
        } else {
            // Tilde paths are expanded at runtime.
            let path_str = self.sync.path.to_string_lossy();
            if !path_str.starts_with('~') && !self.sync.path.is_dir() {
                errors.push(ValidationError {
                    field: "sync.path".into(),
                    message: format!("directory does not exist: {}", self.sync.path.display()),
                });
            }
        }
        if let Err(e) = self.sync.compiled_pattern() {
            errors.push(ValidationError {
                field: "sync.file_pattern".into(),
                message: format!("invalid regular expression: {e}"),
            });
        }

        // --- transfer ---
        positive(&mut errors, "transfer.parallel_checksum", self.transfer.parallel_checksum);
        positive(&mut errors, "transfer.parallel_uploads", self.transfer.parallel_uploads);
        positive(&mut errors, "transfer.parallel_deletes", self.transfer.parallel_deletes);
        if self.transfer.retry_max_delay_ms < self.transfer.retry_base_delay_ms {
            errors.push(ValidationError {
                field: "transfer.retry_max_delay_ms".into(),
                message: format!(
                    "must be >= retry_base_delay_ms ({})",
                    self.transfer.retry_base_delay_ms
                ),
            });
        }

        // --- scan ---
        positive(&mut errors, "scan.max_concurrent", self.scan.max_concurrent);

        // --- drive ---
        parses_as_url(&mut errors, "drive.token_url", &self.drive.token_url);
        parses_as_url(&mut errors, "drive.authorize_url", &self.drive.authorize_url);
        parses_as_url(&mut errors, "drive.discovery_url", &self.drive.discovery_url);
        parses_as_url(&mut errors, "drive.redirect_uri", &self.drive.redirect_uri);
        if self.drive.page_size == 0 || self.drive.page_size > MAX_PAGE_SIZE {
            errors.push(ValidationError {
                field: "drive.page_size".into(),
                message: format!("must be in range 1..={MAX_PAGE_SIZE}"),
            });
        }

        // --- auth ---
        if self.auth.client_id.trim().is_empty() {
            errors.push(ValidationError {
                field: "auth.client_id".into(),
                message: "must not be empty".into(),
            });
        }
        if self.auth.client_secret.trim().is_empty() {
            errors.push(ValidationError {
                field: "auth.client_secret".into(),
                message: "must not be empty".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use cdsync_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .sync_path(PathBuf::from("/home/user/Pictures"))
///     .sync_dry_run(true)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Start from an existing configuration (e.g. one loaded from disk).
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    // --- sync ---

    pub fn sync_path(mut self, path: PathBuf) -> Self {
        self.config.sync.path = path;
        self
    }

    pub fn sync_file_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.sync.file_pattern = pattern.into();
        self
    }

    pub fn sync_dry_run(mut self, dry_run: bool) -> Self {
        self.config.sync.dry_run = dry_run;
        self
    }

    pub fn sync_checksum(mut self, checksum: bool) -> Self {
        self.config.sync.checksum = checksum;
        self
    }

    pub fn sync_delete(mut self, delete: bool) -> Self {
        self.config.sync.delete = delete;
        self
    }

    // --- transfer ---

    pub fn transfer_parallel_checksum(mut self, n: usize) -> Self {
        self.config.transfer.parallel_checksum = n;
        self
    }

    pub fn transfer_parallel_uploads(mut self, n: usize) -> Self {
        self.config.transfer.parallel_uploads = n;
        self
    }

    pub fn transfer_parallel_deletes(mut self, n: usize) -> Self {
        self.config.transfer.parallel_deletes = n;
        self
    }

    pub fn transfer_upload_retries(mut self, n: u32) -> Self {
        self.config.transfer.upload_retries = n;
        self
    }

    pub fn transfer_delete_retries(mut self, n: u32) -> Self {
        self.config.transfer.delete_retries = n;
        self
    }

    pub fn transfer_retry_delays_ms(mut self, base: u64, max: u64) -> Self {
        self.config.transfer.retry_base_delay_ms = base;
        self.config.transfer.retry_max_delay_ms = max;
        self
    }

    // --- scan ---

    pub fn scan_max_concurrent(mut self, n: usize) -> Self {
        self.config.scan.max_concurrent = n;
        self
    }

    // --- drive ---

    pub fn drive_discovery_url(mut self, url: impl Into<String>) -> Self {
        self.config.drive.discovery_url = url.into();
        self
    }

    pub fn drive_token_url(mut self, url: impl Into<String>) -> Self {
        self.config.drive.token_url = url.into();
        self
    }

    pub fn drive_page_size(mut self, n: u32) -> Self {
        self.config.drive.page_size = n;
        self
    }

    pub fn drive_folder_label(mut self, label: impl Into<String>) -> Self {
        self.config.drive.folder_label = label.into();
        self
    }

    // --- auth ---

    pub fn auth_client(mut self, id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.config.auth.client_id = id.into();
        self.config.auth.client_secret = secret.into();
        self
    }

    pub fn auth_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.config.auth.refresh_token = Some(token.into());
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
