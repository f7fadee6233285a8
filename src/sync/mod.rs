//! Sync orchestration: share validation, discovery, transfer and
//! archive post-processing composed into the public entry points.

mod retry;

pub use retry::retry_with_delay;

use crate::archive::{ArchiveOptions, ArchiveProcessor, ArchiveSummary};
use crate::catalog::{total_file_bytes, CatalogBuilder, CatalogEntry};
use crate::config::{PackageSpec, SyncConfig};
use crate::error::Result;
use crate::filter::{FilterSpec, InclusionFilter};
use crate::progress::{format_bytes, format_duration, ProgressSnapshot, ProgressTracker};
use crate::share::ShareEndpoint;
use crate::transfer::{self, TransferCoordinator, TransferOutcome, TransferSummary};
use retry::{blocking, with_timeout};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Errors shown individually at the end of a run; the rest are counted.
const ERRORS_SHOWN: usize = 5;

/// External observer called after every file outcome.
pub type ProgressObserver = dyn Fn(&ProgressSnapshot, &TransferOutcome) + Send + Sync;

/// Per-call switches for a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncRequest {
    pub overwrite: bool,
    pub clear_destination: bool,
    pub show_progress: bool,
}

impl Default for SyncRequest {
    fn default() -> Self {
        Self {
            overwrite: false,
            clear_destination: true,
            show_progress: true,
        }
    }
}

/// Outcome of one configured package.
#[derive(Debug, Clone)]
pub struct PackageReport {
    pub name: String,
    pub local_path: PathBuf,
    pub transfer: TransferSummary,
    pub archives: Option<ArchiveSummary>,
    /// Archive processing was configured for this package
    pub archives_requested: bool,
}

impl PackageReport {
    /// Failed files, failed archives, or requested processing that never ran.
    pub fn is_degraded(&self) -> bool {
        self.transfer.is_degraded()
            || match &self.archives {
                Some(archives) => archives.is_degraded(),
                None => self.archives_requested,
            }
    }
}

/// Mirrors one network share into local directories.
pub struct ShareSync {
    endpoint: ShareEndpoint,
    config: Arc<SyncConfig>,
    observer: Option<Arc<ProgressObserver>>,
    archives: ArchiveProcessor,
}

impl ShareSync {
    /// Fails with a config error before touching the share.
    pub fn new(share_path: impl Into<String>, config: SyncConfig) -> Result<Self> {
        config.validate()?;
        let endpoint = ShareEndpoint::new(share_path);
        tracing::info!("Share sync ready for {}", endpoint.normalized());

        Ok(Self {
            endpoint,
            config: Arc::new(config),
            observer: None,
            archives: ArchiveProcessor::new(),
        })
    }

    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&ProgressSnapshot, &TransferOutcome) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn endpoint(&self) -> &ShareEndpoint {
        &self.endpoint
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Validate and probe the share, each step retried and time-bounded.
    pub async fn validate_remote(&self) -> Result<()> {
        let limit = self.config.connection_timeout();

        self.retry("validate share", || {
            let endpoint = self.endpoint.clone();
            with_timeout("share validation", limit, blocking(move || endpoint.validate()))
        })
        .await?;

        self.retry("probe share", || {
            let endpoint = self.endpoint.clone();
            with_timeout("share probe", limit, blocking(move || endpoint.test_access()))
        })
        .await
    }

    /// Validate the share and list entries under `subpath` that pass `filter`.
    pub async fn list_files(
        &self,
        subpath: Option<&str>,
        filter: Option<&FilterSpec>,
        show_details: bool,
    ) -> Result<Vec<CatalogEntry>> {
        self.validate_remote().await?;
        let entries = self.discover(subpath.unwrap_or(""), filter).await?;

        if show_details {
            let dirs = entries.iter().filter(|e| e.is_dir).count();
            tracing::info!(
                "Found {} entries in {}: {} directories, {} files, {} total",
                entries.len(),
                self.endpoint.normalized(),
                dirs,
                entries.len() - dirs,
                format_bytes(total_file_bytes(&entries))
            );
        }

        Ok(entries)
    }

    /// Mirror the share into `local_root`.
    ///
    /// Precondition failures propagate. Per-file failures only show up in
    /// the returned summary.
    pub async fn sync_only(
        &self,
        local_root: &Path,
        filter: Option<&FilterSpec>,
        request: SyncRequest,
    ) -> Result<TransferSummary> {
        let started = Instant::now();

        transfer::ensure_writable(local_root)?;

        tracing::info!("Validating share access");
        self.validate_remote().await?;

        tracing::info!("Discovering files");
        let entries = self.discover("", filter).await?;
        if entries.is_empty() {
            tracing::warn!("No files found on {}", self.endpoint.normalized());
            return Ok(TransferSummary::empty());
        }

        let total_bytes = total_file_bytes(&entries);
        let file_count = entries.iter().filter(|e| !e.is_dir).count() as u64;
        tracing::info!(
            "Discovered {} entries ({} files, {})",
            entries.len(),
            file_count,
            format_bytes(total_bytes)
        );

        transfer::ensure_free_space(local_root, total_bytes)?;

        let mut tracker = ProgressTracker::new().with_display(request.show_progress);
        tracker.start(file_count, total_bytes);

        let observer = self.observer.clone();
        let coordinator = TransferCoordinator::new(self.endpoint.path(), self.config.clone());
        let mut on_outcome = |outcome: &TransferOutcome| {
            tracker.record(outcome);
            if let Some(observer) = &observer {
                observer(&tracker.snapshot(), outcome);
            }
        };

        let result = coordinator
            .copy_entries(
                &entries,
                local_root,
                request.overwrite,
                request.clear_destination,
                &mut on_outcome,
            )
            .await;
        tracker.finish();

        let mut summary = result?;
        summary.elapsed = started.elapsed();

        tracing::info!(
            "Sync finished: {} succeeded, {} failed in {}",
            summary.successful_files,
            summary.failed_files,
            format_duration(summary.elapsed)
        );
        log_errors(&summary.errors);

        Ok(summary)
    }

    /// Sync, then post-process archives when `archive` is given.
    ///
    /// A post-processing failure is logged and leaves the archive summary
    /// empty; the transfer summary is still returned.
    pub async fn sync_and_process(
        &self,
        local_root: &Path,
        filter: Option<&FilterSpec>,
        request: SyncRequest,
        archive: Option<ArchiveOptions>,
    ) -> Result<(TransferSummary, Option<ArchiveSummary>)> {
        let transfer = self.sync_only(local_root, filter, request).await?;

        let Some(options) = archive else {
            return Ok((transfer, None));
        };

        tracing::info!("Processing archives in {}", local_root.display());
        let archives = match self.process_archives(local_root, options).await {
            Ok(summary) => {
                log_errors(&summary.errors);
                Some(summary)
            }
            Err(e) => {
                tracing::error!("Archive processing failed: {}", e);
                None
            }
        };

        Ok((transfer, archives))
    }

    /// Extract and merge the category archives under `local_root`.
    pub async fn process_archives(
        &self,
        local_root: &Path,
        options: ArchiveOptions,
    ) -> Result<ArchiveSummary> {
        let processor = self.archives;
        let base = local_root.to_path_buf();
        blocking(move || processor.process_categories(&base, &options)).await
    }

    /// Extract every archive under `dir`.
    pub async fn extract_all(
        &self,
        dir: &Path,
        output: Option<&Path>,
        keep_original: bool,
        create_subdirs: bool,
    ) -> Result<ArchiveSummary> {
        let processor = self.archives;
        let dir = dir.to_path_buf();
        let output = output.map(Path::to_path_buf);
        blocking(move || {
            processor.extract_all(&dir, output.as_deref(), keep_original, create_subdirs)
        })
        .await
    }

    /// Run one configured package end to end.
    pub async fn run_package(package: &PackageSpec, config: SyncConfig) -> Result<PackageReport> {
        tracing::info!("Running package {}", package.name);

        let sync = ShareSync::new(package.share_path.clone(), config)?;
        let filter = (!package.filter.is_empty()).then_some(&package.filter);
        let request = SyncRequest {
            overwrite: package.overwrite,
            clear_destination: package.clear_destination,
            show_progress: false,
        };
        let archive = package.process_archives.then(|| ArchiveOptions {
            keep_original_archives: package.keep_original_archives,
            cross_merge: package.cross_merge,
            ..Default::default()
        });

        let (transfer, archives) = sync
            .sync_and_process(&package.local_path, filter, request, archive)
            .await?;

        Ok(PackageReport {
            name: package.name.clone(),
            local_path: package.local_path.clone(),
            transfer,
            archives,
            archives_requested: package.process_archives,
        })
    }

    async fn discover(
        &self,
        subpath: &str,
        filter: Option<&FilterSpec>,
    ) -> Result<Vec<CatalogEntry>> {
        let filter = filter.map(|spec| Arc::new(InclusionFilter::new(spec)));
        if let Some(filter) = &filter {
            tracing::info!(
                "Active filter: {}",
                serde_json::to_string(&filter.summary()).unwrap_or_default()
            );
        }

        self.retry("discover files", || {
            let builder = CatalogBuilder::new(self.endpoint.path());
            let subpath = subpath.to_string();
            let filter = filter.clone();
            blocking(move || builder.discover_under(&subpath, filter.as_deref()))
        })
        .await
    }

    async fn retry<F, Fut, T>(&self, operation: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        retry_with_delay(
            operation,
            self.config.retry_attempts,
            self.config.retry_delay(),
            op,
        )
        .await
    }
}

fn log_errors(errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    tracing::warn!("Encountered {} errors", errors.len());
    for error in errors.iter().take(ERRORS_SHOWN) {
        tracing::warn!("  - {}", error);
    }
    if errors.len() > ERRORS_SHOWN {
        tracing::warn!("  ... and {} more", errors.len() - ERRORS_SHOWN);
    }
}
