//! Transfer of catalog entries from the share into a local root.

mod coordinator;
mod copier;
mod outcome;

pub use coordinator::{OutcomeCallback, TransferCoordinator};
pub use copier::{ChunkedCopier, FileCopier};
pub use outcome::{TransferOutcome, TransferSummary};

use crate::error::{Result, SyncError};
use std::path::{Path, PathBuf};

/// Sentinel written to probe destination writability.
const WRITE_PROBE: &str = ".sync_test";

/// Create the local root if needed and prove it accepts writes.
pub fn ensure_writable(local_root: &Path) -> Result<()> {
    std::fs::create_dir_all(local_root).map_err(|e| {
        SyncError::Transfer(format!(
            "cannot create local root {}: {}",
            local_root.display(),
            e
        ))
    })?;

    let probe = local_root.join(WRITE_PROBE);
    std::fs::write(&probe, b"")
        .and_then(|_| std::fs::remove_file(&probe))
        .map_err(|e| {
            SyncError::Transfer(format!(
                "local root {} is not writable: {}",
                local_root.display(),
                e
            ))
        })
}

/// Delete and recreate the destination subtree.
pub fn clear_destination(local_root: &Path) -> Result<()> {
    if local_root.exists() {
        tracing::info!("Clearing destination {}", local_root.display());
        std::fs::remove_dir_all(local_root).map_err(|e| {
            SyncError::Transfer(format!(
                "cannot clear destination {}: {}",
                local_root.display(),
                e
            ))
        })?;
    }
    std::fs::create_dir_all(local_root).map_err(|e| {
        SyncError::Transfer(format!(
            "cannot recreate destination {}: {}",
            local_root.display(),
            e
        ))
    })
}

/// Refuse to start when the destination volume is too small.
///
/// A failed space inquiry is logged and treated as "enough space".
pub fn ensure_free_space(local_root: &Path, required: u64) -> Result<()> {
    if required == 0 {
        return Ok(());
    }

    let probe_at = nearest_existing(local_root);
    let available = match fs2::available_space(&probe_at) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(
                "Free-space check failed for {}: {}, continuing",
                probe_at.display(),
                e
            );
            return Ok(());
        }
    };

    check_space(available, required)?;
    tracing::info!(
        "Disk space check passed: need {}, available {}",
        crate::progress::format_bytes(required),
        crate::progress::format_bytes(available)
    );
    Ok(())
}

fn check_space(available: u64, required: u64) -> Result<()> {
    if available < required {
        const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
        return Err(SyncError::Transfer(format!(
            "insufficient disk space: need {:.2} GB, available {:.2} GB",
            required as f64 / GIB,
            available as f64 / GIB
        )));
    }
    Ok(())
}

fn nearest_existing(path: &Path) -> PathBuf {
    path.ancestors()
        .find(|p| p.exists())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}
