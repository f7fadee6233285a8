//! Bounded-concurrency batch copy.
//!
//! Directories are created first, sequentially. File copies then run as
//! tokio tasks gated by a semaphore, so at most `max_concurrent_transfers`
//! are in flight. Each task retries locally and always produces exactly one
//! outcome. Outcomes travel over a channel to a single collector loop, which
//! is the only place the caller's callback runs.

use super::copier::{backup_existing, verify_copy, ChunkedCopier, FileCopier};
use super::outcome::{TransferOutcome, TransferSummary};
use crate::catalog::{total_file_bytes, CatalogEntry};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};

/// Called once per file outcome, serialized on the collector.
pub type OutcomeCallback<'a> = dyn FnMut(&TransferOutcome) + Send + 'a;

pub struct TransferCoordinator {
    source_root: PathBuf,
    config: Arc<SyncConfig>,
    copier: Arc<dyn FileCopier>,
}

impl TransferCoordinator {
    pub fn new(source_root: impl Into<PathBuf>, config: Arc<SyncConfig>) -> Self {
        let copier = Arc::new(ChunkedCopier::new(config.chunk_size, config.read_timeout()));
        Self {
            source_root: source_root.into(),
            config,
            copier,
        }
    }

    /// Replace the copy primitive.
    pub fn with_copier(mut self, copier: Arc<dyn FileCopier>) -> Self {
        self.copier = copier;
        self
    }

    /// Local path an entry lands on.
    pub fn target_for(&self, entry: &CatalogEntry, local_root: &Path) -> PathBuf {
        match entry.path.strip_prefix(&self.source_root) {
            Ok(relative) => local_root.join(relative),
            Err(_) => local_root.join(&entry.name),
        }
    }

    /// Copy every entry into `local_root`.
    ///
    /// Precondition failures (unwritable root, failed clear, insufficient
    /// space) abort before anything is copied. Per-file failures are
    /// recorded in the summary and never abort the batch.
    pub async fn copy_entries(
        &self,
        entries: &[CatalogEntry],
        local_root: &Path,
        overwrite: bool,
        clear_destination: bool,
        on_outcome: &mut OutcomeCallback<'_>,
    ) -> Result<TransferSummary> {
        let started = Instant::now();

        super::ensure_writable(local_root)?;
        if clear_destination {
            super::clear_destination(local_root)?;
        }

        let total_bytes = total_file_bytes(entries);
        super::ensure_free_space(local_root, total_bytes)?;

        for entry in entries.iter().filter(|e| e.is_dir) {
            let dir = self.target_for(entry, local_root);
            if let Err(e) = tokio::fs::create_dir_all(&dir).await {
                tracing::warn!("Failed to create directory {}: {}", dir.display(), e);
            }
        }

        let files: Vec<(CatalogEntry, PathBuf)> = entries
            .iter()
            .filter(|e| !e.is_dir)
            .map(|e| (e.clone(), self.target_for(e, local_root)))
            .collect();

        tracing::info!(
            "Transferring {} files with up to {} in flight",
            files.len(),
            self.config.max_concurrent_transfers
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<TransferOutcome>();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_transfers));

        let dispatch = async {
            let mut handles = Vec::with_capacity(files.len());

            for (entry, target) in files {
                let permit = semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|e| SyncError::Transfer(e.to_string()))?;
                let tx = tx.clone();
                let config = self.config.clone();
                let copier = self.copier.clone();
                let task_entry = entry.clone();
                let task_target = target.clone();

                let handle = tokio::spawn(async move {
                    let _permit = permit;
                    let outcome =
                        transfer_one(task_entry, task_target, overwrite, &config, copier.as_ref())
                            .await;
                    let _ = tx.send(outcome);
                });
                handles.push((entry, target, handle));
            }

            for (entry, target, handle) in handles {
                if let Err(e) = handle.await {
                    let message = format!("transfer task for {} aborted: {}", entry.name, e);
                    tracing::error!("{}", message);
                    let _ = tx.send(TransferOutcome::failed(
                        entry,
                        target,
                        message,
                        Default::default(),
                        0,
                    ));
                }
            }

            drop(tx);
            Ok::<(), SyncError>(())
        };

        let collect = async {
            let mut outcomes = Vec::new();
            while let Some(outcome) = rx.recv().await {
                on_outcome(&outcome);
                outcomes.push(outcome);
            }
            outcomes
        };

        let (dispatched, outcomes) = tokio::join!(dispatch, collect);
        dispatched?;

        let mut summary = TransferSummary::from_outcomes(&outcomes, total_bytes);
        summary.elapsed = started.elapsed();
        Ok(summary)
    }
}

async fn transfer_one(
    entry: CatalogEntry,
    target: PathBuf,
    overwrite: bool,
    config: &SyncConfig,
    copier: &dyn FileCopier,
) -> TransferOutcome {
    let started = Instant::now();

    if !tokio::fs::try_exists(&*entry.path).await.unwrap_or(true) {
        tracing::debug!("{} vanished from the share, skipping", entry.path.display());
        return TransferOutcome::skipped(entry, target, started.elapsed());
    }

    let exists = tokio::fs::try_exists(&target).await.unwrap_or(false);

    if exists && !overwrite {
        let message = format!(
            "{} already exists and overwrite is disabled",
            target.display()
        );
        tracing::debug!("{}", message);
        return TransferOutcome::failed(entry, target, message, started.elapsed(), 0);
    }

    if let Some(parent) = target.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            let message = format!("cannot create {}: {}", parent.display(), e);
            return TransferOutcome::failed(entry, target, message, started.elapsed(), 0);
        }
    }

    let mut backup = None;
    if exists && config.create_backup {
        match backup_existing(&target).await {
            Ok(path) => backup = path,
            Err(e) => {
                let message = format!("cannot back up {}: {}", target.display(), e);
                return TransferOutcome::failed(entry, target, message, started.elapsed(), 0);
            }
        }
    }

    let max_attempts = config.retry_attempts + 1;
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        match copy_attempt(&entry, &target, config, copier).await {
            Ok(bytes) => {
                tracing::debug!("Copied {} -> {}", entry.path.display(), target.display());
                return TransferOutcome::succeeded(entry, target, bytes, started.elapsed(), attempt);
            }
            Err(e) => {
                last_error = e.to_string();
                if attempt < max_attempts {
                    tracing::warn!(
                        "Retrying {} (attempt {}/{}): {}",
                        entry.name,
                        attempt,
                        max_attempts,
                        e
                    );
                    tokio::time::sleep(config.retry_delay()).await;
                }
            }
        }
    }

    let message = format!(
        "failed to copy {} after {} attempts: {}",
        entry.path.display(),
        max_attempts,
        last_error
    );
    tracing::warn!("{}", message);

    // Put the previous file back where it was
    if let Some(backup) = backup {
        if let Err(e) = tokio::fs::rename(&backup, &target).await {
            tracing::error!(
                "Cannot restore {} from {}: {}",
                target.display(),
                backup.display(),
                e
            );
        }
    }
    TransferOutcome::failed(entry, target, message, started.elapsed(), max_attempts)
}

async fn copy_attempt(
    entry: &CatalogEntry,
    target: &Path,
    config: &SyncConfig,
    copier: &dyn FileCopier,
) -> std::io::Result<u64> {
    let bytes = copier.copy(&entry.path, target).await?;
    if config.verify_transfers {
        verify_copy(&entry.path, target).await?;
    }
    Ok(bytes)
}
