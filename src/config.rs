//! Engine configuration and package definitions.
//!
//! Config files are TOML or JSON, chosen by extension:
//!
//! ```toml
//! [sync]
//! max_concurrent_transfers = 4
//! retry_attempts = 2
//!
//! [[packages]]
//! name = "nightly"
//! share_path = "//buildsrv/releases/nightly"
//! local_path = "~/packages/nightly"
//! extensions = ["zip"]
//! process_archives = true
//! ```

use crate::error::{Result, SyncError};
use crate::filter::FilterSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Smallest chunk the copier accepts.
pub const MIN_CHUNK_SIZE: usize = 1024;

/// Default copy chunk (64KB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

const LOG_LEVELS: &[&str] = &[
    "trace", "debug", "info", "warn", "warning", "error", "critical",
];

/// Engine-wide settings, validated before any session is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Upper bound on simultaneously in-flight file copies
    pub max_concurrent_transfers: usize,
    /// Bound on share validation and access probes
    pub connection_timeout_secs: u64,
    /// Bound on each chunk read from the share
    pub read_timeout_secs: u64,
    /// Extra attempts after the first failure
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub chunk_size: usize,
    pub log_level: String,
    /// Compare BLAKE3 digests of source and copy after each transfer
    pub verify_transfers: bool,
    /// Move an existing destination file aside before overwriting it
    pub create_backup: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent_transfers: 5,
            connection_timeout_secs: 30,
            read_timeout_secs: 60,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            chunk_size: DEFAULT_CHUNK_SIZE,
            log_level: "info".to_string(),
            verify_transfers: true,
            create_backup: false,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_transfers < 1 {
            return Err(SyncError::Config(
                "max_concurrent_transfers must be at least 1".to_string(),
            ));
        }
        if self.connection_timeout_secs == 0 || self.read_timeout_secs == 0 {
            return Err(SyncError::Config(
                "connection and read timeouts must be at least 1 second".to_string(),
            ));
        }
        if self.chunk_size < MIN_CHUNK_SIZE {
            return Err(SyncError::Config(format!(
                "chunk_size must be at least {} bytes (got {})",
                MIN_CHUNK_SIZE, self.chunk_size
            )));
        }
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(SyncError::Config(format!(
                "unknown log level: {}",
                self.log_level
            )));
        }
        Ok(())
    }

    /// Load a config file holding only engine settings.
    pub fn from_file(path: &Path) -> Result<Self> {
        let config: SyncConfig = parse_file(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Level directive usable by `tracing_subscriber::EnvFilter`.
    pub fn tracing_level(&self) -> &'static str {
        match self.log_level.to_ascii_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "warn" | "warning" => "warn",
            "error" | "critical" => "error",
            _ => "info",
        }
    }
}

/// One share to mirror, as listed in a config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSpec {
    pub name: String,
    pub share_path: String,
    pub local_path: PathBuf,
    #[serde(flatten)]
    pub filter: FilterSpec,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default = "default_true")]
    pub clear_destination: bool,
    #[serde(default)]
    pub process_archives: bool,
    #[serde(default)]
    pub keep_original_archives: bool,
    #[serde(default = "default_true")]
    pub cross_merge: bool,
}

fn default_true() -> bool {
    true
}

/// Top-level config file: engine settings plus package list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub sync: SyncConfig,
    pub packages: Vec<PackageSpec>,
}

impl ConfigFile {
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut file: ConfigFile = parse_file(path)?;
        file.sync.validate()?;
        for package in &mut file.packages {
            package.local_path = expand_tilde(&package.local_path);
        }
        Ok(file)
    }
}

fn parse_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| SyncError::Config(format!("cannot read {}: {}", path.display(), e)))?;

    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        serde_json::from_str(&text)
            .map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))
    } else {
        toml::from_str(&text).map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))
    }
}

/// Expand tilde (~) in paths to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if path_str == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
    } else if let Some(rest) = path_str.strip_prefix("~/") {
        match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        }
    } else {
        path.to_path_buf()
    }
}
