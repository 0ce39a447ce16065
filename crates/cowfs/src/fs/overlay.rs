//! Copy-on-write union filesystem.
//!
//! [`CopyOnWriteFs`] layers a writable overlay on top of a base filesystem that
//! it never modifies.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use super::copy::copy_to_layer;
use super::traits::{File, FileSystem, Metadata, OpenOptions};
use super::union::MergedDir;
use crate::error::{Error, Result};
use crate::logging::{fs_debug, fs_trace};

/// Where a path currently lives, as far as routing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The overlay has an entry; the base is irrelevant.
    OverlayPresent,
    /// The overlay has nothing and the base has an entry.
    BaseOnly,
}

/// Copy-on-write union filesystem.
///
/// A read-only base with a writable overlay on top. Changes are only ever
/// made in the overlay: changing a file that exists in the base but not in
/// the overlay first copies it up ("changing" includes `chmod` and
/// `set_times`).
///
/// # Behavior
///
/// - **Reads**: the overlay wins, the base answers when the overlay has nothing
/// - **Writes**: base-only files are copied to the overlay, then written there
/// - **Renames/removes**: refused with [`Error::PermissionDenied`] for base-only paths
/// - **Directories**: opening a directory present in the overlay yields a
///   [`MergedDir`] listing both layers
///
/// Presence is recomputed from both layers on every call; nothing is cached,
/// so the layers may change underneath between calls. Classification and the
/// action that follows are separate calls, so callers that need the pair to
/// be atomic must serialize access themselves.
///
/// # Example
///
/// ```rust
/// use cowfs::{CopyOnWriteFs, FileSystem, InMemoryFs};
/// use std::path::Path;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> cowfs::Result<()> {
/// let base = Arc::new(InMemoryFs::new());
/// base.write_file(Path::new("/app.conf"), b"debug=false").await?;
///
/// let fs = CopyOnWriteFs::new(base.clone(), Arc::new(InMemoryFs::new()));
/// fs.write_file(Path::new("/app.conf"), b"debug=true").await?;
///
/// assert_eq!(fs.read_file(Path::new("/app.conf")).await?, b"debug=true");
/// assert_eq!(base.read_file(Path::new("/app.conf")).await?, b"debug=false");
/// # Ok(())
/// # }
/// ```
pub struct CopyOnWriteFs {
    base: Arc<dyn FileSystem>,
    layer: Arc<dyn FileSystem>,
}

impl CopyOnWriteFs {
    /// Create a union of `base` (never written) and `layer` (receives all changes).
    pub fn new(base: Arc<dyn FileSystem>, layer: Arc<dyn FileSystem>) -> Self {
        Self { base, layer }
    }

    /// The read-only base layer.
    pub fn base(&self) -> &Arc<dyn FileSystem> {
        &self.base
    }

    /// The writable overlay layer.
    pub fn layer(&self) -> &Arc<dyn FileSystem> {
        &self.layer
    }

    /// Classify `path` against both layers.
    ///
    /// A base lookup error (not-found included) is returned as the error, as is
    /// any overlay error other than not-found.
    pub async fn classify(&self, path: &Path) -> Result<Presence> {
        match self.layer.stat(path).await {
            Ok(_) => {
                fs_trace!(path, "overlay present");
                return Ok(Presence::OverlayPresent);
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        self.base.stat(path).await?;
        fs_trace!(path, "base only");
        Ok(Presence::BaseOnly)
    }

    /// True if `path` exists in the base but not in the overlay.
    pub async fn is_base_only(&self, path: &Path) -> Result<bool> {
        Ok(self.classify(path).await? == Presence::BaseOnly)
    }

    async fn copy_to_layer(&self, path: &Path) -> Result<()> {
        fs_debug!(path, "copying base entry to overlay");
        copy_to_layer(self.base.as_ref(), self.layer.as_ref(), path).await
    }

    /// Copy up `path` when it lives only in the base.
    async fn materialize_if_base_only(&self, path: &Path) -> Result<()> {
        if self.is_base_only(path).await? {
            self.copy_to_layer(path).await?;
        }
        Ok(())
    }

    /// Translate an overlay removal result into the union's answer.
    async fn guard_removal(&self, path: &Path, removed: Result<()>) -> Result<()> {
        match removed {
            Err(e) if e.is_not_found() => {
                if self.base.stat(path).await.is_ok() {
                    fs_debug!(path, "refusing to remove base-only path");
                    Err(Error::PermissionDenied)
                } else {
                    Err(Error::NotFound)
                }
            }
            other => other,
        }
    }

    /// Shared by `mkdir` and `mkdir_all`: both use the overlay's recursive creation.
    async fn make_dir(&self, path: &Path, mode: u32) -> Result<()> {
        match self.base.stat(path).await {
            Ok(meta) if meta.is_dir() => Err(Error::AlreadyExists),
            _ => self.layer.mkdir_all(path, mode).await,
        }
    }
}

#[async_trait]
impl FileSystem for CopyOnWriteFs {
    fn name(&self) -> &str {
        "CopyOnWriteFs"
    }

    async fn stat(&self, path: &Path) -> Result<Metadata> {
        match self.layer.stat(path).await {
            Err(e) if e.is_not_found() => self.base.stat(path).await,
            other => other,
        }
    }

    async fn open(&self, path: &Path) -> Result<Box<dyn File>> {
        if self.is_base_only(path).await? {
            return self.base.open(path).await;
        }

        if !self.layer.stat(path).await?.is_dir() {
            return self.layer.open(path).await;
        }

        // A base file under an overlay directory is shadowed, not merged
        let base = match self.base.stat(path).await {
            Ok(meta) if meta.is_dir() => self.base.open(path).await.ok(),
            _ => None,
        };
        let layer = match self.layer.open(path).await {
            Ok(file) => Some(file),
            Err(e) if base.is_none() => return Err(e),
            Err(_) => None,
        };
        fs_debug!(path, with_base = base.is_some(), "opening merged directory");
        Ok(Box::new(MergedDir::new(base, layer)?))
    }

    async fn open_file(
        &self,
        path: &Path,
        options: OpenOptions,
        mode: u32,
    ) -> Result<Box<dyn File>> {
        let base_only = match self.is_base_only(path).await {
            Ok(base_only) => base_only,
            // Absent from both layers: a creating open goes to the overlay
            Err(e) if e.is_not_found() && options.create => false,
            Err(e) => return Err(e),
        };

        if options.is_mutating() {
            if base_only {
                self.copy_to_layer(path).await?;
            }
            return self.layer.open_file(path, options, mode).await;
        }

        if base_only {
            self.base.open_file(path, options, mode).await
        } else {
            self.layer.open_file(path, options, mode).await
        }
    }

    async fn create(&self, path: &Path) -> Result<Box<dyn File>> {
        if let Ok(true) = self.is_base_only(path).await {
            self.copy_to_layer(path).await?;
        }
        self.layer.create(path).await
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        let removed = self.layer.remove(path).await;
        self.guard_removal(path, removed).await
    }

    async fn remove_all(&self, path: &Path) -> Result<()> {
        let removed = self.layer.remove_all(path).await;
        self.guard_removal(path, removed).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        if self.is_base_only(from).await? {
            fs_debug!(from, "refusing to rename base-only path");
            return Err(Error::PermissionDenied);
        }
        self.layer.rename(from, to).await
    }

    async fn set_times(
        &self,
        path: &Path,
        accessed: SystemTime,
        modified: SystemTime,
    ) -> Result<()> {
        self.materialize_if_base_only(path).await?;
        self.layer.set_times(path, accessed, modified).await
    }

    async fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        self.materialize_if_base_only(path).await?;
        self.layer.chmod(path, mode).await
    }

    async fn mkdir(&self, path: &Path, mode: u32) -> Result<()> {
        self.make_dir(path, mode).await
    }

    async fn mkdir_all(&self, path: &Path, mode: u32) -> Result<()> {
        self.make_dir(path, mode).await
    }
}
