//! Remote share endpoint: path normalization, validation and access probes.
//!
//! The engine never speaks a network protocol itself. A share is reached
//! through the host's redirector (SMB mount, UNC path), so every check here
//! is a plain filesystem call against the normalized path.

use crate::error::{Result, SyncError};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::io;
use std::path::Path;

#[cfg(windows)]
const SEPARATOR: char = '\\';
#[cfg(windows)]
const FOREIGN_SEPARATOR: char = '/';
#[cfg(not(windows))]
const SEPARATOR: char = '/';
#[cfg(not(windows))]
const FOREIGN_SEPARATOR: char = '\\';

/// Canonical form of a network share location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareEndpoint {
    raw: String,
    normalized: String,
}

/// Diagnostic snapshot returned by [`ShareEndpoint::describe`].
#[derive(Debug, Clone, Serialize)]
pub struct ShareInfo {
    pub path: String,
    pub exists: bool,
    pub is_directory: bool,
    pub modified: Option<DateTime<Local>>,
    pub accessible: bool,
    pub error: Option<String>,
}

impl ShareEndpoint {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let normalized = normalize(&raw);
        tracing::debug!("Normalized share path: {} -> {}", raw, normalized);
        Self { raw, normalized }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn path(&self) -> &Path {
        Path::new(&self.normalized)
    }

    /// Check the network prefix, existence and readability of the share.
    pub fn validate(&self) -> Result<()> {
        if !has_network_prefix(&self.raw) {
            return Err(SyncError::ShareAccess(format!(
                "not a network path (expected \\\\host\\share or //host/share): {}",
                self.raw
            )));
        }

        let meta = std::fs::metadata(self.path()).map_err(|e| {
            SyncError::ShareAccess(format!(
                "share path does not exist or is unreachable: {} ({})",
                self.normalized, e
            ))
        })?;

        let readable = if meta.is_dir() {
            std::fs::read_dir(self.path()).map(|_| ())
        } else {
            std::fs::File::open(self.path()).map(|_| ())
        };
        if let Err(e) = readable {
            return Err(SyncError::ShareAccess(format!(
                "no read permission on {}: {}",
                self.normalized, e
            )));
        }

        tracing::info!("Share path validated: {}", self.normalized);
        Ok(())
    }

    /// Lightweight listing of the share root.
    pub fn test_access(&self) -> Result<()> {
        match std::fs::read_dir(self.path()) {
            Ok(_) => {
                tracing::info!("Share access probe succeeded: {}", self.normalized);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                tracing::error!("Permission denied on {}", self.normalized);
                Err(SyncError::Authentication(format!(
                    "access denied to {}: {}",
                    self.normalized, e
                )))
            }
            Err(e) => {
                tracing::error!("Share access probe failed: {}", e);
                Err(SyncError::ShareAccess(format!(
                    "cannot list {}: {}",
                    self.normalized, e
                )))
            }
        }
    }

    /// Never fails; problems are reported inside the snapshot.
    pub fn describe(&self) -> ShareInfo {
        match std::fs::metadata(self.path()) {
            Ok(meta) => {
                let probe = self.test_access();
                ShareInfo {
                    path: self.normalized.clone(),
                    exists: true,
                    is_directory: meta.is_dir(),
                    modified: meta.modified().ok().map(DateTime::<Local>::from),
                    accessible: probe.is_ok(),
                    error: probe.err().map(|e| e.to_string()),
                }
            }
            Err(e) => ShareInfo {
                path: self.normalized.clone(),
                exists: false,
                is_directory: false,
                modified: None,
                accessible: false,
                error: Some(e.to_string()),
            },
        }
    }
}

fn has_network_prefix(raw: &str) -> bool {
    raw.starts_with("\\\\") || raw.starts_with("//")
}

/// Uniform separators, a double-separator prefix, no trailing separator.
pub fn normalize(raw: &str) -> String {
    let mut normalized: String = raw
        .trim()
        .chars()
        .map(|c| if c == FOREIGN_SEPARATOR { SEPARATOR } else { c })
        .collect();

    let leading = normalized.chars().take_while(|c| *c == SEPARATOR).count();
    if leading < 2 {
        let prefix: String = std::iter::repeat(SEPARATOR).take(2 - leading).collect();
        normalized.insert_str(0, &prefix);
    }

    let trimmed_len = normalized.trim_end_matches(SEPARATOR).len();
    // Keep the bare prefix when the whole path is separators
    normalized.truncate(trimmed_len.max(2));
    normalized
}
