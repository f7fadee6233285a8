use crate::catalog::CatalogEntry;
use std::path::PathBuf;
use std::time::Duration;

/// Result of the final copy attempt for one file.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub entry: CatalogEntry,
    pub success: bool,
    pub local_path: PathBuf,
    pub error: Option<String>,
    /// Bytes written by the final attempt only
    pub bytes_transferred: u64,
    pub elapsed: Duration,
    /// Copy attempts made (0 when the file was never attempted)
    pub attempts: u32,
    /// The source vanished before its copy started
    pub skipped: bool,
}

impl TransferOutcome {
    pub fn succeeded(
        entry: CatalogEntry,
        local_path: PathBuf,
        bytes: u64,
        elapsed: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            entry,
            success: true,
            local_path,
            error: None,
            bytes_transferred: bytes,
            elapsed,
            attempts,
            skipped: false,
        }
    }

    pub fn failed(
        entry: CatalogEntry,
        local_path: PathBuf,
        error: impl Into<String>,
        elapsed: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            entry,
            success: false,
            local_path,
            error: Some(error.into()),
            bytes_transferred: 0,
            elapsed,
            attempts,
            skipped: false,
        }
    }

    pub fn skipped(entry: CatalogEntry, local_path: PathBuf, elapsed: Duration) -> Self {
        Self {
            entry,
            success: false,
            local_path,
            error: None,
            bytes_transferred: 0,
            elapsed,
            attempts: 0,
            skipped: true,
        }
    }
}

/// Aggregate result of one synchronization batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferSummary {
    /// Non-directory entries in the batch
    pub total_files: u64,
    pub successful_files: u64,
    pub failed_files: u64,
    pub skipped_files: u64,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    pub elapsed: Duration,
    pub errors: Vec<String>,
}

impl TransferSummary {
    /// Summary for a batch with nothing to do.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_outcomes(outcomes: &[TransferOutcome], total_bytes: u64) -> Self {
        let mut summary = TransferSummary {
            total_files: outcomes.len() as u64,
            total_bytes,
            ..Default::default()
        };

        for outcome in outcomes {
            if outcome.skipped {
                summary.skipped_files += 1;
            } else if outcome.success {
                summary.successful_files += 1;
                summary.transferred_bytes = summary
                    .transferred_bytes
                    .saturating_add(outcome.bytes_transferred);
            } else {
                summary.failed_files += 1;
            }
            if let Some(ref error) = outcome.error {
                summary.errors.push(error.clone());
            }
        }

        summary
    }

    /// Any failed file marks the run as degraded even without an error.
    pub fn is_degraded(&self) -> bool {
        self.failed_files > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn entry(name: &str, size: u64) -> CatalogEntry {
        CatalogEntry::new(
            format!("/share/{}", name),
            size,
            SystemTime::UNIX_EPOCH,
            false,
        )
    }

    #[test]
    fn test_summary_from_outcomes() {
        let outcomes = vec![
            TransferOutcome::succeeded(
                entry("a", 10),
                PathBuf::from("/local/a"),
                10,
                Duration::from_millis(5),
                1,
            ),
            TransferOutcome::failed(
                entry("b", 20),
                PathBuf::from("/local/b"),
                "already exists",
                Duration::ZERO,
                0,
            ),
        ];

        let summary = TransferSummary::from_outcomes(&outcomes, 30);
        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.successful_files, 1);
        assert_eq!(summary.failed_files, 1);
        assert_eq!(summary.transferred_bytes, 10);
        assert_eq!(summary.total_bytes, 30);
        assert_eq!(summary.errors, vec!["already exists".to_string()]);
        assert!(summary.is_degraded());
    }

    #[test]
    fn test_skipped_outcome_is_not_a_failure() {
        let outcomes = vec![TransferOutcome::skipped(
            entry("gone", 10),
            PathBuf::from("/local/gone"),
            Duration::ZERO,
        )];

        let summary = TransferSummary::from_outcomes(&outcomes, 10);
        assert_eq!(summary.total_files, 1);
        assert_eq!(summary.skipped_files, 1);
        assert_eq!(summary.failed_files, 0);
        assert!(summary.errors.is_empty());
        assert!(!summary.is_degraded());
    }

    #[test]
    fn test_empty_summary() {
        let summary = TransferSummary::empty();
        assert_eq!(summary.total_files, 0);
        assert!(!summary.is_degraded());
    }
}
