//! Single-file copy primitives.

use async_trait::async_trait;
use filetime::FileTime;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Suffix of the in-progress file a copy writes before renaming into place.
const PARTIAL_SUFFIX: &str = ".sharesync.part";

/// Copies one file and reports the bytes written.
#[async_trait]
pub trait FileCopier: Send + Sync {
    async fn copy(&self, source: &Path, target: &Path) -> io::Result<u64>;
}

/// Chunked async copy that preserves the source modification time.
#[derive(Debug, Clone)]
pub struct ChunkedCopier {
    chunk_size: usize,
    read_timeout: Duration,
}

impl ChunkedCopier {
    pub fn new(chunk_size: usize, read_timeout: Duration) -> Self {
        Self {
            chunk_size,
            read_timeout,
        }
    }
}

#[async_trait]
impl FileCopier for ChunkedCopier {
    async fn copy(&self, source: &Path, target: &Path) -> io::Result<u64> {
        let partial = partial_path(target);
        let result = self.copy_into(source, &partial).await;

        match result {
            Ok(bytes) => {
                fs::rename(&partial, target).await?;
                preserve_times(source, target).await;
                Ok(bytes)
            }
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                Err(e)
            }
        }
    }
}

impl ChunkedCopier {
    async fn copy_into(&self, source: &Path, target: &Path) -> io::Result<u64> {
        let mut src = File::open(source).await?;
        let mut dst = File::create(target).await?;
        let mut buf = vec![0u8; self.chunk_size];
        let mut written = 0u64;

        loop {
            let n = tokio::time::timeout(self.read_timeout, src.read(&mut buf))
                .await
                .map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!(
                            "read from {} timed out after {:?}",
                            source.display(),
                            self.read_timeout
                        ),
                    )
                })??;
            if n == 0 {
                break;
            }
            dst.write_all(&buf[..n]).await?;
            written += n as u64;
        }

        dst.flush().await?;
        Ok(written)
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(PARTIAL_SUFFIX);
    target.with_file_name(name)
}

async fn preserve_times(source: &Path, target: &Path) {
    let source = source.to_path_buf();
    let target = target.to_path_buf();

    let result = tokio::task::spawn_blocking(move || {
        let meta = std::fs::metadata(&source)?;
        filetime::set_file_times(
            &target,
            FileTime::from_last_access_time(&meta),
            FileTime::from_last_modification_time(&meta),
        )
    })
    .await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!("Failed to preserve timestamps: {}", e),
        Err(e) => tracing::warn!("Timestamp task failed: {}", e),
    }
}

/// BLAKE3 digest of a file's contents.
async fn file_digest(path: &Path) -> io::Result<blake3::Hash> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&path)?;
        let mut hasher = blake3::Hasher::new();
        hasher.update_reader(file)?;
        Ok(hasher.finalize())
    })
    .await
    .map_err(io::Error::other)?
}

/// Fail when source and copy differ.
pub async fn verify_copy(source: &Path, target: &Path) -> io::Result<()> {
    let (expected, actual) = tokio::try_join!(file_digest(source), file_digest(target))?;
    if expected != actual {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "checksum mismatch for {}: expected {}, got {}",
                target.display(),
                expected.to_hex(),
                actual.to_hex()
            ),
        ));
    }
    Ok(())
}

/// Move an existing file to `<name>.bak`, replacing an older backup.
pub async fn backup_existing(target: &Path) -> io::Result<Option<PathBuf>> {
    if !fs::try_exists(target).await? {
        return Ok(None);
    }
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".bak");
    let backup = target.with_file_name(name);
    fs::rename(target, &backup).await?;
    tracing::debug!("Backed up {} to {}", target.display(), backup.display());
    Ok(Some(backup))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_chunked_copy_preserves_content_and_mtime() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src.bin");
        let dst = tmp.path().join("dst.bin");
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&src, &data).unwrap();

        let old = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&src, old).unwrap();

        let copier = ChunkedCopier::new(1024, Duration::from_secs(5));
        let bytes = copier.copy(&src, &dst).await.unwrap();

        assert_eq!(bytes, data.len() as u64);
        assert_eq!(std::fs::read(&dst).unwrap(), data);
        let meta = std::fs::metadata(&dst).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&meta), old);
        assert!(!partial_path(&dst).exists());
    }

    #[tokio::test]
    async fn test_missing_source_leaves_no_partial() {
        let tmp = TempDir::new().unwrap();
        let dst = tmp.path().join("dst.bin");

        let copier = ChunkedCopier::new(1024, Duration::from_secs(5));
        assert!(copier.copy(&tmp.path().join("absent"), &dst).await.is_err());
        assert!(!dst.exists());
        assert!(!partial_path(&dst).exists());
    }

    #[tokio::test]
    async fn test_verify_detects_mismatch() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        std::fs::write(&a, "same").unwrap();
        std::fs::write(&b, "same").unwrap();
        verify_copy(&a, &b).await.unwrap();

        std::fs::write(&b, "different").unwrap();
        let err = verify_copy(&a, &b).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_backup_existing() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("pkg.zip");
        assert!(backup_existing(&target).await.unwrap().is_none());

        std::fs::write(&target, "v1").unwrap();
        let backup = backup_existing(&target).await.unwrap().unwrap();
        assert_eq!(backup, tmp.path().join("pkg.zip.bak"));
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "v1");
        assert!(!target.exists());
    }
}
