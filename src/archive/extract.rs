//! ZIP extraction and archive discovery.

use crate::error::{Result, SyncError};
use ignore::WalkBuilder;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

#[cfg(unix)]
const EXTRACTED_MODE: u32 = 0o644;

/// Every `.zip` beneath `dir` (case-insensitive), in file-name order.
pub fn find_archives(dir: &Path) -> Vec<PathBuf> {
    let mut builder = WalkBuilder::new(dir);
    builder
        .standard_filters(false)
        .hidden(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b));

    builder
        .build()
        .filter_map(|result| match result {
            Ok(dent) => Some(dent),
            Err(e) => {
                tracing::warn!("Skipping unreadable path while searching archives: {}", e);
                None
            }
        })
        .filter(|dent| dent.file_type().is_some_and(|t| t.is_file()))
        .map(|dent| dent.into_path())
        .filter(|path| is_zip(path))
        .collect()
}

fn is_zip(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
}

/// Extract `archive` into `dest` and return the number of files written.
///
/// An archive that cannot be opened or read as ZIP fails as a whole.
/// Individual entries that fail, or whose names would escape `dest`, are
/// logged and skipped.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<u64> {
    let file = File::open(archive).map_err(|e| {
        SyncError::ArchiveProcessing(format!("cannot open {}: {}", archive.display(), e))
    })?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| {
        SyncError::ArchiveProcessing(format!("invalid zip file {}: {}", archive.display(), e))
    })?;

    fs::create_dir_all(dest).map_err(|e| SyncError::file_access(dest, e))?;

    let mut extracted = 0u64;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|e| {
            SyncError::ArchiveProcessing(format!(
                "corrupt entry {} in {}: {}",
                index,
                archive.display(),
                e
            ))
        })?;

        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!(
                "Skipping unsafe entry {} in {}",
                entry.name(),
                archive.display()
            );
            continue;
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            if let Err(e) = fs::create_dir_all(&target) {
                tracing::warn!("Failed to create {}: {}", target.display(), e);
            }
            continue;
        }

        match write_entry(&mut entry, &target) {
            Ok(()) => extracted += 1,
            Err(e) => tracing::warn!("Failed to extract {}: {}", target.display(), e),
        }
    }

    tracing::debug!("Extracted {} files from {}", extracted, archive.display());
    Ok(extracted)
}

fn write_entry(entry: &mut impl io::Read, target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = File::create(target)?;
    io::copy(entry, &mut out)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(target, fs::Permissions::from_mode(EXTRACTED_MODE))?;
    }
    Ok(())
}

/// Copy every file beneath `source` into `target`, keeping relative paths.
pub fn copy_tree_contents(source: &Path, target: &Path) -> io::Result<u64> {
    let mut copied = 0u64;
    let mut builder = WalkBuilder::new(source);
    builder.standard_filters(false).hidden(false).follow_links(false);

    for result in builder.build() {
        let dent = result.map_err(io::Error::other)?;
        if !dent.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let relative = dent
            .path()
            .strip_prefix(source)
            .map_err(io::Error::other)?;
        let dest = target.join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(dent.path(), &dest)?;
        copied += 1;
    }
    Ok(copied)
}

/// True when `dir` exists and has at least one entry.
pub fn is_non_empty_dir(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}


#[cfg(test)]
mod tests {
    use super::fixtures::write_zip;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_extract_files_and_dirs() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("pkg.zip");
        write_zip(
            &archive,
            &[("bin/", ""), ("bin/app.vbf", "app"), ("readme.txt", "hi")],
        );

        let dest = tmp.path().join("out");
        let count = extract_archive(&archive, &dest).unwrap();

        assert_eq!(count, 2);
        assert_eq!(fs::read_to_string(dest.join("bin/app.vbf")).unwrap(), "app");
        assert_eq!(fs::read_to_string(dest.join("readme.txt")).unwrap(), "hi");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(dest.join("readme.txt")).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o644);
        }
    }

    #[test]
    fn test_corrupt_archive_is_error() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("broken.zip");
        fs::write(&archive, b"this is not a zip file").unwrap();

        let result = extract_archive(&archive, &tmp.path().join("out"));
        assert!(matches!(result, Err(SyncError::ArchiveProcessing(_))));
    }

    #[test]
    fn test_traversal_entries_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("evil.zip");
        write_zip(&archive, &[("../escape.txt", "x"), ("safe.txt", "ok")]);

        let dest = tmp.path().join("out");
        let count = extract_archive(&archive, &dest).unwrap();

        assert_eq!(count, 1);
        assert!(!tmp.path().join("escape.txt").exists());
        assert!(dest.join("safe.txt").exists());
    }

    #[test]
    fn test_find_archives_recursive_case_insensitive() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a/b")).unwrap();
        fs::write(tmp.path().join("b.ZIP"), "").unwrap();
        fs::write(tmp.path().join("a/b/a.zip"), "").unwrap();
        fs::write(tmp.path().join("notes.txt"), "").unwrap();

        let found = find_archives(tmp.path());
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| is_zip(p)));
    }

    #[test]
    fn test_copy_tree_contents() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("top.bin"), "1").unwrap();
        fs::write(src.join("nested/deep.bin"), "2").unwrap();

        let dst = tmp.path().join("dst");
        assert_eq!(copy_tree_contents(&src, &dst).unwrap(), 2);
        assert_eq!(
            fs::read_to_string(dst.join("nested/deep.bin")).unwrap(),
            "2"
        );
        assert!(!is_non_empty_dir(&tmp.path().join("missing")));
        assert!(is_non_empty_dir(&dst));
    }
}
