//! Per-session transfer progress.
//!
//! The tracker is owned by one sync call and updated only from the
//! coordinator's collector loop, so plain counters suffice.

use crate::transfer::{TransferOutcome, TransferSummary};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use std::time::{Duration, Instant};

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}";

/// Point-in-time view of a running batch.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProgressSnapshot {
    pub total_files: u64,
    pub completed_files: u64,
    pub failed_files: u64,
    pub skipped_files: u64,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    pub file_percent: f64,
    pub byte_percent: f64,
    /// Bytes per second since `start`
    pub throughput: f64,
    pub elapsed: Duration,
    pub eta: Option<Duration>,
}

impl ProgressSnapshot {
    pub fn processed_files(&self) -> u64 {
        self.completed_files
            .saturating_add(self.failed_files)
            .saturating_add(self.skipped_files)
    }
}

pub struct ProgressTracker {
    total_files: u64,
    completed_files: u64,
    failed_files: u64,
    skipped_files: u64,
    total_bytes: u64,
    transferred_bytes: u64,
    started: Option<Instant>,
    errors: Vec<String>,
    bar: Option<ProgressBar>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            total_files: 0,
            completed_files: 0,
            failed_files: 0,
            skipped_files: 0,
            total_bytes: 0,
            transferred_bytes: 0,
            started: None,
            errors: Vec::new(),
            bar: None,
        }
    }

    /// Draw a byte progress bar on stderr. Hidden when stderr is not a tty.
    pub fn with_display(mut self, show: bool) -> Self {
        if show {
            let style = ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> ");
            let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
            bar.set_style(style);
            self.bar = Some(bar);
        }
        self
    }

    /// Reset counters and start the clock.
    pub fn start(&mut self, total_files: u64, total_bytes: u64) {
        self.total_files = total_files;
        self.total_bytes = total_bytes;
        self.completed_files = 0;
        self.failed_files = 0;
        self.skipped_files = 0;
        self.transferred_bytes = 0;
        self.errors.clear();
        self.started = Some(Instant::now());

        if let Some(bar) = &self.bar {
            bar.set_length(total_bytes);
            bar.set_position(0);
        }
        tracing::info!(
            "Starting transfer of {} files ({})",
            total_files,
            format_bytes(total_bytes)
        );
    }

    pub fn record(&mut self, outcome: &TransferOutcome) {
        if outcome.skipped {
            self.record_skipped();
        } else if outcome.success {
            self.completed_files = self.completed_files.saturating_add(1);
            self.transferred_bytes = self
                .transferred_bytes
                .saturating_add(outcome.bytes_transferred);
        } else {
            self.failed_files = self.failed_files.saturating_add(1);
            if let Some(error) = &outcome.error {
                self.errors.push(error.clone());
            }
        }

        if let Some(bar) = &self.bar {
            bar.set_position(self.transferred_bytes.min(self.total_bytes));
            bar.set_message(format!(
                "{}/{} files",
                self.processed_files(),
                self.total_files
            ));
        }
    }

    fn record_skipped(&mut self) {
        self.skipped_files = self.skipped_files.saturating_add(1);
    }

    fn processed_files(&self) -> u64 {
        self.completed_files
            .saturating_add(self.failed_files)
            .saturating_add(self.skipped_files)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.map(|s| s.elapsed()).unwrap_or_default()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot_at(self.elapsed())
    }

    fn snapshot_at(&self, elapsed: Duration) -> ProgressSnapshot {
        let secs = elapsed.as_secs_f64();
        let throughput = if secs > 0.0 {
            self.transferred_bytes as f64 / secs
        } else {
            0.0
        };

        let remaining = self.total_bytes.saturating_sub(self.transferred_bytes);
        let eta = if throughput > 0.0 {
            Duration::try_from_secs_f64(remaining as f64 / throughput).ok()
        } else {
            None
        };

        ProgressSnapshot {
            total_files: self.total_files,
            completed_files: self.completed_files,
            failed_files: self.failed_files,
            skipped_files: self.skipped_files,
            total_bytes: self.total_bytes,
            transferred_bytes: self.transferred_bytes,
            file_percent: percent(self.processed_files(), self.total_files),
            byte_percent: percent(self.transferred_bytes, self.total_bytes),
            throughput,
            elapsed,
            eta,
        }
    }

    /// One-line status for interactive display.
    pub fn render_line(&self) -> String {
        render(&self.snapshot())
    }

    /// Terminal summary equivalent to the coordinator's.
    pub fn summary(&self) -> TransferSummary {
        TransferSummary {
            total_files: self.total_files,
            successful_files: self.completed_files,
            failed_files: self.failed_files,
            skipped_files: self.skipped_files,
            total_bytes: self.total_bytes,
            transferred_bytes: self.transferred_bytes,
            elapsed: self.elapsed(),
            errors: self.errors.clone(),
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
        let snapshot = self.snapshot();
        tracing::info!(
            "Transfer finished: {} ok, {} failed, {} in {} ({})",
            snapshot.completed_files,
            snapshot.failed_files,
            format_bytes(snapshot.transferred_bytes),
            format_duration(snapshot.elapsed),
            format_speed(snapshot.throughput)
        );
    }
}

fn percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (done as f64 / total as f64 * 100.0).min(100.0)
}

fn render(s: &ProgressSnapshot) -> String {
    let eta = match s.eta {
        Some(eta) => format_duration(eta),
        None => "--".to_string(),
    };
    format!(
        "Progress: {}/{} files ({:.1}%) | {}/{} ({:.1}%) | {} | ETA {}",
        s.processed_files(),
        s.total_files,
        s.file_percent,
        format_bytes(s.transferred_bytes),
        format_bytes(s.total_bytes),
        s.byte_percent,
        format_speed(s.throughput),
        eta
    )
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

pub fn format_speed(bytes_per_sec: f64) -> String {
    if !bytes_per_sec.is_finite() || bytes_per_sec <= 0.0 {
        return "0 B/s".to_string();
    }
    format!("{}/s", format_bytes(bytes_per_sec as u64))
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}
