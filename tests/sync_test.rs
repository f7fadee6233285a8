//! End-to-end tests of the public sync API against a temp directory
//! standing in for a mounted share.
//!
//! On Unix a `//`-prefixed absolute path resolves like the plain path, so
//! `//tmp/...` passes share validation without a real network mount.

#![cfg(unix)]

use sharesync::archive::ArchiveOptions;
use sharesync::{FilterSpec, ShareSync, SyncConfig, SyncError, SyncRequest};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

fn share_path(dir: &Path) -> String {
    format!("/{}", dir.display())
}

fn config() -> SyncConfig {
    SyncConfig {
        max_concurrent_transfers: 2,
        retry_attempts: 1,
        retry_delay_ms: 0,
        ..Default::default()
    }
}

fn quiet(overwrite: bool, clear_destination: bool) -> SyncRequest {
    SyncRequest {
        overwrite,
        clear_destination,
        show_progress: false,
    }
}

fn write_zip(path: &Path, entries: &[(&str, &str)]) -> anyhow::Result<()> {
    fs::create_dir_all(path.parent().unwrap())?;
    let mut writer = zip::ZipWriter::new(File::create(path)?);
    for (name, contents) in entries {
        writer.start_file(*name, SimpleFileOptions::default())?;
        writer.write_all(contents.as_bytes())?;
    }
    writer.finish()?;
    Ok(())
}

#[tokio::test]
async fn test_second_sync_without_overwrite_changes_nothing() -> anyhow::Result<()> {
    let share = TempDir::new()?;
    fs::create_dir(share.path().join("sub"))?;
    fs::write(share.path().join("a.txt"), "alpha")?;
    fs::write(share.path().join("sub/b.txt"), "beta")?;
    let local = TempDir::new()?;
    let dest = local.path().join("mirror");

    let sync = ShareSync::new(share_path(share.path()), config())?;

    let first = sync.sync_only(&dest, None, quiet(false, true)).await?;
    assert_eq!(first.successful_files, 2);
    assert_eq!(first.failed_files, 0);

    let second = sync.sync_only(&dest, None, quiet(false, false)).await?;
    assert_eq!(second.total_files, 2);
    assert_eq!(second.successful_files, 0);
    assert_eq!(second.failed_files, 2);
    assert!(second.errors.iter().all(|e| e.contains("already exists")));

    assert_eq!(fs::read_to_string(dest.join("a.txt"))?, "alpha");
    assert_eq!(fs::read_to_string(dest.join("sub/b.txt"))?, "beta");
    Ok(())
}

#[tokio::test]
async fn test_overwrite_replaces_local_edits() -> anyhow::Result<()> {
    let share = TempDir::new()?;
    fs::write(share.path().join("a.txt"), "fresh")?;
    let dest = TempDir::new()?;
    fs::write(dest.path().join("a.txt"), "stale")?;

    let sync = ShareSync::new(share_path(share.path()), config())?;
    let summary = sync.sync_only(dest.path(), None, quiet(true, false)).await?;

    assert_eq!(summary.successful_files, 1);
    assert_eq!(fs::read_to_string(dest.path().join("a.txt"))?, "fresh");
    Ok(())
}

#[tokio::test]
async fn test_extension_filter_selects_archives() -> anyhow::Result<()> {
    let share = TempDir::new()?;
    fs::write(share.path().join("one.txt"), "1")?;
    fs::write(share.path().join("two.txt"), "2")?;
    fs::write(share.path().join("pkg.ZIP"), "3")?;

    let filter = FilterSpec {
        extensions: vec!["zip".to_string()],
        ..Default::default()
    };
    let sync = ShareSync::new(share_path(share.path()), config())?;
    let entries = sync.list_files(None, Some(&filter), false).await?;

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "pkg.ZIP");
    Ok(())
}

#[tokio::test]
async fn test_sync_and_process_merges_categories() -> anyhow::Result<()> {
    let share = TempDir::new()?;
    write_zip(
        &share.path().join("MCU/VBF_ReleasePackage_FX12-A2-M1_MCU_R3.3.7B1.zip"),
        &[("mcu/app.vbf", "mcu")],
    )?;
    write_zip(
        &share.path().join("SOC/VBF_P181_SOC_J3.3.7B10.zip"),
        &[("soc/image.bin", "soc")],
    )?;
    let local = TempDir::new()?;
    let dest = local.path().join("pkg");

    let sync = ShareSync::new(share_path(share.path()), config())?;
    let (transfer, archives) = sync
        .sync_and_process(
            &dest,
            None,
            quiet(false, true),
            Some(ArchiveOptions::default()),
        )
        .await?;

    assert_eq!(transfer.successful_files, 2);
    let archives = archives.expect("archive summary");
    assert_eq!(archives.total_archives, 2);
    assert_eq!(archives.processed_archives, 2);
    assert_eq!(archives.failed_archives, 0);

    let out = dest.join("extracted");
    assert!(out.join("FX12-A2-M1/mcu/app.vbf").exists());
    assert!(out.join("FX12-A2-M1/soc/image.bin").exists());
    assert!(out.join("SOC_P181/soc/image.bin").exists());
    assert!(!dest.join("MCU").exists());
    assert!(!dest.join("SOC").exists());
    Ok(())
}

#[tokio::test]
async fn test_corrupt_archive_counted_not_raised() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    write_zip(&dir.path().join("a.zip"), &[("a.txt", "a")])?;
    write_zip(&dir.path().join("b.zip"), &[("b.txt", "b")])?;
    fs::write(dir.path().join("c.zip"), "not a zip")?;

    let sync = ShareSync::new("//unused/share", config())?;
    let summary = sync
        .extract_all(dir.path(), Some(&dir.path().join("out")), true, true)
        .await?;

    assert_eq!(summary.total_archives, 3);
    assert_eq!(summary.processed_archives, 2);
    assert_eq!(summary.failed_archives, 1);
    assert_eq!(summary.extracted_files, 2);
    Ok(())
}

#[tokio::test]
async fn test_process_missing_base_is_archive_error() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let sync = ShareSync::new("//unused/share", config())?;

    let result = sync
        .process_archives(&dir.path().join("missing"), ArchiveOptions::default())
        .await;
    assert!(matches!(result, Err(SyncError::ArchiveProcessing(_))));
    Ok(())
}
