use super::extract::{copy_tree_contents, extract_archive, find_archives, is_non_empty_dir};
use super::naming::{Category, NamingConvention};
use super::{ArchiveOptions, ArchiveSummary, DEFAULT_OUTPUT_DIR};
use crate::error::{Result, SyncError};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Folders removed by [`ArchiveProcessor::cleanup_category_dirs`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub deleted: Vec<PathBuf>,
    pub errors: Vec<String>,
}

/// Extracts package archives. All work is blocking filesystem I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveProcessor;

impl ArchiveProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Extract both category directories under `base` and optionally
    /// cross-merge their outputs.
    ///
    /// A missing category directory is skipped. Per-archive failures are
    /// recorded in the summary. Only a missing `base` is an error.
    pub fn process_categories(
        &self,
        base: &Path,
        options: &ArchiveOptions,
    ) -> Result<ArchiveSummary> {
        let started = Instant::now();

        if !base.exists() {
            return Err(SyncError::ArchiveProcessing(format!(
                "base path does not exist: {}",
                base.display()
            )));
        }

        let output = options
            .output_dir
            .clone()
            .unwrap_or_else(|| base.join(DEFAULT_OUTPUT_DIR));
        fs::create_dir_all(&output).map_err(|e| {
            SyncError::ArchiveProcessing(format!(
                "cannot create output directory {}: {}",
                output.display(),
                e
            ))
        })?;

        tracing::info!(
            "Processing category archives under {} into {}",
            base.display(),
            output.display()
        );

        let naming = &options.naming;
        let mut summary = ArchiveSummary::default();
        let mut primary_outputs = Vec::new();
        let mut secondary_outputs = Vec::new();
        let mut present = 0;

        for category in [Category::Primary, Category::Secondary] {
            let source = base.join(naming.category_dir(category));
            if !source.is_dir() {
                tracing::warn!("Category directory missing, skipping: {}", source.display());
                continue;
            }
            present += 1;

            let (part, dirs) = self.process_category(&source, &output, category, options);
            summary.absorb(part);
            match category {
                Category::Primary => primary_outputs = dirs,
                Category::Secondary => secondary_outputs = dirs,
            }
        }

        if options.cross_merge && present == 2 {
            self.cross_merge(&primary_outputs, &secondary_outputs, &mut summary);
        }

        if options.keep_original_archives {
            tracing::info!("Keeping original category directories");
        } else {
            let cleanup = self.cleanup_category_dirs(base, naming);
            summary.errors.extend(cleanup.errors);
        }

        summary.elapsed = started.elapsed();
        tracing::info!(
            "Archive processing finished: {}/{} archives, {} files into {} directories",
            summary.processed_archives,
            summary.total_archives,
            summary.extracted_files,
            summary.output_directories.len()
        );
        Ok(summary)
    }

    fn process_category(
        &self,
        source: &Path,
        output: &Path,
        category: Category,
        options: &ArchiveOptions,
    ) -> (ArchiveSummary, Vec<PathBuf>) {
        let archives = find_archives(source);
        tracing::info!("Found {} archives in {}", archives.len(), source.display());

        let mut summary = ArchiveSummary {
            total_archives: archives.len() as u64,
            ..Default::default()
        };
        let mut dirs = Vec::new();

        for archive in archives {
            let name = options.naming.output_name(&archive, category);
            let target = unique_output_dir(output, &name);
            tracing::info!("Extracting {} to {}", archive.display(), target.display());

            match extract_archive(&archive, &target) {
                Ok(count) => {
                    summary.processed_archives += 1;
                    summary.extracted_files += count;
                    summary.output_directories.push(target.clone());
                    dirs.push(target);
                    if !options.keep_original_archives {
                        remove_archive(&archive, &mut summary.errors);
                    }
                }
                Err(e) => {
                    let message = format!("failed to process {}: {}", archive.display(), e);
                    tracing::error!("{}", message);
                    summary.failed_archives += 1;
                    summary.errors.push(message);
                }
            }
        }

        (summary, dirs)
    }

    /// Copy each secondary output's files into every primary output.
    fn cross_merge(
        &self,
        primary: &[PathBuf],
        secondary: &[PathBuf],
        summary: &mut ArchiveSummary,
    ) {
        if primary.is_empty() || secondary.is_empty() {
            tracing::warn!("Nothing to cross-merge");
            return;
        }

        for target in primary {
            for source in secondary {
                match copy_tree_contents(source, target) {
                    Ok(count) => {
                        tracing::debug!(
                            "Merged {} files from {} into {}",
                            count,
                            source.display(),
                            target.display()
                        );
                        summary.extracted_files += count;
                    }
                    Err(e) => {
                        let message = format!(
                            "failed to merge {} into {}: {}",
                            source.display(),
                            target.display(),
                            e
                        );
                        tracing::error!("{}", message);
                        summary.errors.push(message);
                    }
                }
            }
        }
    }

    /// Delete both category directories under `base`. Failures are
    /// collected, never raised.
    pub fn cleanup_category_dirs(
        &self,
        base: &Path,
        naming: &NamingConvention,
    ) -> CleanupReport {
        let mut report = CleanupReport::default();

        for category in [Category::Primary, Category::Secondary] {
            let dir = base.join(naming.category_dir(category));
            if !dir.exists() {
                continue;
            }
            match fs::remove_dir_all(&dir) {
                Ok(()) => {
                    tracing::info!("Removed {}", dir.display());
                    report.deleted.push(dir);
                }
                Err(e) => {
                    let message = format!("failed to remove {}: {}", dir.display(), e);
                    tracing::warn!("{}", message);
                    report.errors.push(message);
                }
            }
        }

        report
    }

    /// Extract every archive beneath `dir`, independent of categories.
    ///
    /// `output` defaults to `dir` itself. With `create_subdirs` each archive
    /// gets `<output>/<stem>`.
    pub fn extract_all(
        &self,
        dir: &Path,
        output: Option<&Path>,
        keep_original: bool,
        create_subdirs: bool,
    ) -> Result<ArchiveSummary> {
        let started = Instant::now();

        if !dir.is_dir() {
            return Err(SyncError::ArchiveProcessing(format!(
                "not a directory: {}",
                dir.display()
            )));
        }

        let output = output.unwrap_or(dir);
        fs::create_dir_all(output).map_err(|e| SyncError::file_access(output, e))?;

        let archives = find_archives(dir);
        tracing::info!("Found {} archives in {}", archives.len(), dir.display());

        let mut summary = ArchiveSummary {
            total_archives: archives.len() as u64,
            ..Default::default()
        };

        for archive in archives {
            let target = if create_subdirs {
                let stem = archive
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                output.join(stem)
            } else {
                output.to_path_buf()
            };

            match extract_archive(&archive, &target) {
                Ok(count) => {
                    summary.processed_archives += 1;
                    summary.extracted_files += count;
                    if create_subdirs {
                        summary.output_directories.push(target);
                    }
                    if !keep_original {
                        remove_archive(&archive, &mut summary.errors);
                    }
                }
                Err(e) => {
                    let message = format!("failed to process {}: {}", archive.display(), e);
                    tracing::error!("{}", message);
                    summary.failed_archives += 1;
                    summary.errors.push(message);
                }
            }
        }

        summary.elapsed = started.elapsed();
        Ok(summary)
    }
}

/// `<output>/<name>`, or `<name>_N` while that directory is already in use.
fn unique_output_dir(output: &Path, name: &str) -> PathBuf {
    let mut candidate = output.join(name);
    let mut counter = 1;
    while is_non_empty_dir(&candidate) {
        candidate = output.join(format!("{}_{}", name, counter));
        counter += 1;
    }
    candidate
}

fn remove_archive(archive: &Path, errors: &mut Vec<String>) {
    match fs::remove_file(archive) {
        Ok(()) => tracing::debug!("Removed archive {}", archive.display()),
        Err(e) => {
            let message = format!("failed to remove {}: {}", archive.display(), e);
            tracing::warn!("{}", message);
            errors.push(message);
        }
    }
}
