//! At-most-once source file removal.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use hl_core::{Error, Result};

/// Deletes one source file at most once, however many times it is asked.
///
/// The first call to [`delete_once`](Self::delete_once) claims the guard;
/// every later call is a no-op. A file that is already gone counts as
/// cleaned.
#[derive(Debug)]
pub struct SourceCleanup {
    path: PathBuf,
    claimed: AtomicBool,
}

impl SourceCleanup {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            claimed: AtomicBool::new(false),
        }
    }

    /// The file this guard deletes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a delete has been attempted.
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }

    /// Delete the file if no earlier call has.
    ///
    /// Returns `Ok(true)` if this call removed the file, `Ok(false)` if the
    /// guard was already claimed or the file did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if removal fails for any reason other than the
    /// file being absent. The guard stays claimed.
    pub async fn delete_once(&self) -> Result<bool> {
        if self.claimed.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::info!("Deleted source {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Source {} already removed", self.path.display());
                Ok(false)
            }
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn deletes_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("sample.mp4");
        std::fs::write(&src, "data").unwrap();

        let cleanup = SourceCleanup::new(&src);
        assert!(cleanup.delete_once().await.unwrap());
        assert!(!src.exists());
        assert!(cleanup.is_claimed());
    }

    #[tokio::test]
    async fn second_call_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("sample.mp4");
        std::fs::write(&src, "data").unwrap();

        let cleanup = SourceCleanup::new(&src);
        assert!(cleanup.delete_once().await.unwrap());

        // Recreate: a second call must not touch it.
        std::fs::write(&src, "new").unwrap();
        assert!(!cleanup.delete_once().await.unwrap());
        assert!(src.exists());
    }

    #[tokio::test]
    async fn missing_file_counts_as_cleaned() {
        let dir = tempfile::tempdir().unwrap();
        let cleanup = SourceCleanup::new(dir.path().join("never-existed.mp4"));
        assert!(!cleanup.delete_once().await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_callers_delete_once() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("sample.mp4");
        std::fs::write(&src, "data").unwrap();

        let cleanup = Arc::new(SourceCleanup::new(&src));
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let cleanup = cleanup.clone();
            tasks.spawn(async move { cleanup.delete_once().await.unwrap() });
        }

        let mut deleted = 0;
        while let Some(result) = tasks.join_next().await {
            if result.unwrap() {
                deleted += 1;
            }
        }
        assert_eq!(deleted, 1);
        assert!(!src.exists());
    }

    #[tokio::test]
    async fn directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let cleanup = SourceCleanup::new(dir.path());
        assert!(matches!(cleanup.delete_once().await, Err(Error::Io { .. })));
        assert_eq!(cleanup.path(), dir.path());
    }
}
