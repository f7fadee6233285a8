//! Post-processing of synced package trees.
//!
//! A package root holds two category directories of ZIP archives. Each
//! archive is extracted into its own output directory, named from the
//! archive file name, and the secondary category's output can be merged
//! into every primary output directory.

mod extract;
mod naming;
mod processor;

pub use extract::{copy_tree_contents, extract_archive, find_archives};
pub use naming::{Category, NamingConvention};
pub use processor::{ArchiveProcessor, CleanupReport};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default output directory name under the package root.
pub const DEFAULT_OUTPUT_DIR: &str = "extracted";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveOptions {
    /// Defaults to `<base>/extracted`
    pub output_dir: Option<PathBuf>,
    pub keep_original_archives: bool,
    pub cross_merge: bool,
    pub naming: NamingConvention,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            output_dir: None,
            keep_original_archives: false,
            cross_merge: true,
            naming: NamingConvention::default(),
        }
    }
}

/// Result of one post-processing run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchiveSummary {
    pub total_archives: u64,
    pub processed_archives: u64,
    pub failed_archives: u64,
    /// Files written by extraction and by cross-merge copies
    pub extracted_files: u64,
    pub output_directories: Vec<PathBuf>,
    pub elapsed: Duration,
    pub errors: Vec<String>,
}

impl ArchiveSummary {
    pub fn is_degraded(&self) -> bool {
        self.failed_archives > 0
    }

    fn absorb(&mut self, other: ArchiveSummary) {
        self.total_archives += other.total_archives;
        self.processed_archives += other.processed_archives;
        self.failed_archives += other.failed_archives;
        self.extracted_files += other.extracted_files;
        self.output_directories.extend(other.output_directories);
        self.errors.extend(other.errors);
    }
}
