//! Filesystem helpers: atomic writes and best-effort cleanup.

use std::path::Path;
use tokio::fs;
use uuid::Uuid;

use crate::error::MediaResult;

fn sibling_temp_path(path: &Path) -> std::path::PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
}

/// Write `contents` to `path` atomically.
///
/// Data goes to a temp file in the same directory which is then renamed
/// over `path`, so readers never observe a partial file.
pub async fn write_atomic(path: impl AsRef<Path>, contents: &[u8]) -> MediaResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let tmp = sibling_temp_path(path);
    fs::write(&tmp, contents).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Delete files, logging failures instead of returning them.
///
/// Missing files count as removed. Returns the number of files that
/// could not be deleted.
pub async fn remove_files_best_effort<P: AsRef<Path>>(paths: &[P]) -> usize {
    let mut failures = 0;
    for path in paths {
        let path = path.as_ref();
        match fs::remove_file(path).await {
            Ok(()) => tracing::debug!("Removed {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                failures += 1;
                tracing::warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
    failures
}

/// Recursively delete a directory, logging failures.
pub async fn remove_dir_best_effort(dir: impl AsRef<Path>) -> bool {
    let dir = dir.as_ref();
    match fs::remove_dir_all(dir).await {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            tracing::warn!("Failed to remove directory {}: {}", dir.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_atomic_replaces_and_leaves_no_temp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summary.json");

        tokio_test::assert_ok!(write_atomic(&path, b"{\"a\":1}").await);
        tokio_test::assert_ok!(write_atomic(&path, b"{\"a\":2}").await);

        assert_eq!(fs::read_to_string(&path).await.unwrap(), "{\"a\":2}");
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn test_remove_files_best_effort_tolerates_missing() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.wav");
        fs::write(&a, b"x").await.unwrap();
        let missing = dir.path().join("missing.wav");

        let failures = remove_files_best_effort(&[a.clone(), missing]).await;
        assert_eq!(failures, 0);
        assert!(!a.exists());
    }

    #[tokio::test]
    async fn test_remove_dir_best_effort() {
        let dir = TempDir::new().unwrap();
        let scratch = dir.path().join("scratch");
        fs::create_dir_all(scratch.join("nested")).await.unwrap();
        fs::write(scratch.join("nested/a.wav"), b"x").await.unwrap();

        assert!(remove_dir_best_effort(&scratch).await);
        assert!(!scratch.exists());
        assert!(remove_dir_best_effort(&scratch).await);
    }
}
