use crate::error::{Result, SyncError};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Metadata record for one discovered file or directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Final path component
    pub name: String,

    /// Absolute path on the share
    pub path: Arc<PathBuf>,

    /// File size in bytes (0 for directories)
    pub size: u64,

    /// Modification time
    pub modified: SystemTime,

    pub is_dir: bool,

    /// Low nine permission bits, where the platform has them
    pub permissions: Option<u32>,
}

impl CatalogEntry {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: SystemTime, is_dir: bool) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            name,
            path: Arc::new(path),
            size: if is_dir { 0 } else { size },
            modified,
            is_dir,
            permissions: None,
        }
    }

    pub fn from_metadata(path: &Path, meta: &Metadata) -> Self {
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let mut entry = Self::new(path, meta.len(), modified, meta.is_dir());
        entry.permissions = permission_bits(meta);
        entry
    }
}

/// Stat a single path into a catalog entry.
pub fn entry_for_path(path: &Path) -> Result<CatalogEntry> {
    let meta = std::fs::metadata(path).map_err(|e| SyncError::file_access(path, e))?;
    Ok(CatalogEntry::from_metadata(path, &meta))
}

#[cfg(unix)]
fn permission_bits(meta: &Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(meta.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn permission_bits(_meta: &Metadata) -> Option<u32> {
    None
}
