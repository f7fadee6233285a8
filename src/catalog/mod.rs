//! File catalog: recursive discovery of a share subtree.
//!
//! Discovery is blocking filesystem work. Async callers run it inside
//! `tokio::task::spawn_blocking`.

mod entry;

pub use entry::{entry_for_path, CatalogEntry};

use crate::error::{Result, SyncError};
use crate::filter::InclusionFilter;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Walks a root and collects catalog entries accepted by a filter.
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    root: PathBuf,
}

impl CatalogBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Discover every entry beneath the root.
    pub fn discover(&self, filter: Option<&InclusionFilter>) -> Result<Vec<CatalogEntry>> {
        self.discover_under("", filter)
    }

    /// Discover entries beneath `subpath` (relative to the root).
    ///
    /// An unreadable starting directory is an error. Unreadable entries
    /// further down are logged and skipped. Directories are always descended
    /// into, whether or not the filter keeps the directory entry itself.
    pub fn discover_under(
        &self,
        subpath: &str,
        filter: Option<&InclusionFilter>,
    ) -> Result<Vec<CatalogEntry>> {
        let relative = subpath.trim_start_matches(['/', '\\']);
        let base = if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        };

        tracing::info!("Discovering files under {}", base.display());

        // Total failure must surface instead of yielding an empty catalog
        std::fs::read_dir(&base).map_err(|e| SyncError::file_access(&base, e))?;

        let mut builder = WalkBuilder::new(&base);
        builder
            .standard_filters(false)
            .hidden(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b));

        let mut entries = Vec::new();
        let mut skipped = 0usize;

        for result in builder.build() {
            let dent = match result {
                Ok(dent) => dent,
                Err(e) => {
                    tracing::warn!("Skipping inaccessible branch: {}", e);
                    skipped += 1;
                    continue;
                }
            };

            if dent.depth() == 0 {
                continue;
            }

            let entry = match entry_for_path(dent.path()) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("{}", e);
                    skipped += 1;
                    continue;
                }
            };

            let keep = filter.map_or(true, |f| f.should_include(&entry));
            if keep {
                tracing::debug!(
                    "Discovered {} {}",
                    if entry.is_dir { "directory" } else { "file" },
                    entry.name
                );
                entries.push(entry);
            } else {
                tracing::debug!("Filtered out {}", entry.name);
            }
        }

        tracing::info!(
            "Discovery finished: {} entries ({} skipped)",
            entries.len(),
            skipped
        );

        Ok(entries)
    }
}

/// Total size of regular files beneath `path`. Unreadable entries count as zero.
pub fn directory_size(path: &Path) -> u64 {
    let mut builder = WalkBuilder::new(path);
    builder.standard_filters(false).hidden(false).follow_links(false);

    builder
        .build()
        .filter_map(|result| result.ok())
        .filter_map(|dent| dent.metadata().ok())
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
        .sum()
}

/// Aggregate byte size of the non-directory entries.
pub fn total_file_bytes(entries: &[CatalogEntry]) -> u64 {
    entries
        .iter()
        .filter(|e| !e.is_dir)
        .fold(0u64, |acc, e| acc.saturating_add(e.size))
}
