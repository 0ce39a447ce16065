//! Read-only filesystem wrapper.
//!
//! [`ReadOnlyFs`] forwards every query to an inner filesystem and rejects
//! every mutation with [`Error::PermissionDenied`]. Wrapping the base layer of
//! a [`CopyOnWriteFs`](super::CopyOnWriteFs) in it turns "the base is never
//! mutated" into something the type system and the tests can check.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use super::traits::{File, FileSystem, Metadata, OpenOptions};
use crate::error::{Error, Result};

/// Read-only view of another filesystem.
pub struct ReadOnlyFs {
    inner: Arc<dyn FileSystem>,
}

impl ReadOnlyFs {
    /// Wrap `inner`. Reads pass through, writes fail.
    pub fn new(inner: Arc<dyn FileSystem>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl FileSystem for ReadOnlyFs {
    fn name(&self) -> &str {
        "ReadOnlyFs"
    }

    async fn stat(&self, path: &Path) -> Result<Metadata> {
        self.inner.stat(path).await
    }

    async fn open(&self, path: &Path) -> Result<Box<dyn File>> {
        self.inner.open(path).await
    }

    async fn open_file(
        &self,
        path: &Path,
        options: OpenOptions,
        mode: u32,
    ) -> Result<Box<dyn File>> {
        if options.is_mutating() {
            return Err(Error::PermissionDenied);
        }
        self.inner.open_file(path, options, mode).await
    }

    async fn create(&self, _path: &Path) -> Result<Box<dyn File>> {
        Err(Error::PermissionDenied)
    }

    async fn remove(&self, _path: &Path) -> Result<()> {
        Err(Error::PermissionDenied)
    }

    async fn remove_all(&self, _path: &Path) -> Result<()> {
        Err(Error::PermissionDenied)
    }

    async fn rename(&self, _from: &Path, _to: &Path) -> Result<()> {
        Err(Error::PermissionDenied)
    }

    async fn set_times(
        &self,
        _path: &Path,
        _accessed: SystemTime,
        _modified: SystemTime,
    ) -> Result<()> {
        Err(Error::PermissionDenied)
    }

    async fn chmod(&self, _path: &Path, _mode: u32) -> Result<()> {
        Err(Error::PermissionDenied)
    }

    async fn mkdir(&self, _path: &Path, _mode: u32) -> Result<()> {
        Err(Error::PermissionDenied)
    }

    async fn mkdir_all(&self, _path: &Path, _mode: u32) -> Result<()> {
        Err(Error::PermissionDenied)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;

    async fn setup() -> (Arc<InMemoryFs>, ReadOnlyFs) {
        let inner = Arc::new(InMemoryFs::new());
        inner
            .write_file(Path::new("/file.txt"), b"content")
            .await
            .unwrap();
        let ro = ReadOnlyFs::new(inner.clone());
        (inner, ro)
    }

    #[tokio::test]
    async fn test_reads_pass_through() {
        let (_, ro) = setup().await;

        assert_eq!(ro.read_file(Path::new("/file.txt")).await.unwrap(), b"content");
        assert_eq!(ro.stat(Path::new("/file.txt")).await.unwrap().size, 7);
    }

    #[tokio::test]
    async fn test_mutations_denied() {
        let (inner, ro) = setup().await;
        let p = Path::new("/file.txt");

        assert!(matches!(ro.remove(p).await, Err(Error::PermissionDenied)));
        assert!(matches!(ro.remove_all(p).await, Err(Error::PermissionDenied)));
        assert!(matches!(
            ro.rename(p, Path::new("/other")).await,
            Err(Error::PermissionDenied)
        ));
        assert!(matches!(ro.chmod(p, 0o600).await, Err(Error::PermissionDenied)));
        assert!(matches!(
            ro.mkdir(Path::new("/d"), 0o755).await,
            Err(Error::PermissionDenied)
        ));
        assert!(matches!(
            ro.create(p).await.err(),
            Some(Error::PermissionDenied)
        ));
        assert!(matches!(
            ro.write_file(p, b"changed").await,
            Err(Error::PermissionDenied)
        ));

        assert_eq!(inner.read_file(p).await.unwrap(), b"content");
    }

    #[tokio::test]
    async fn test_mutating_open_denied() {
        let (_, ro) = setup().await;

        let options = OpenOptions::new().read(true).append(true);
        let err = ro
            .open_file(Path::new("/file.txt"), options, 0)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::PermissionDenied));

        let options = OpenOptions::new().read(true);
        assert!(ro.open_file(Path::new("/file.txt"), options, 0).await.is_ok());
    }
}
