//! Filesystem trait definitions

use async_trait::async_trait;
use std::path::Path;
use std::time::SystemTime;

use crate::error::{Error, Result};

/// Default mode used by [`FileSystem::create`].
pub const DEFAULT_FILE_MODE: u32 = 0o666;

/// Async filesystem trait.
///
/// Every store implements this trait: the base and the overlay of a
/// [`CopyOnWriteFs`](super::CopyOnWriteFs) are both `Arc<dyn FileSystem>`, and
/// the copy-on-write layer implements it too, so layers compose.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Name of the store, for diagnostics.
    fn name(&self) -> &str;

    /// Get file metadata.
    async fn stat(&self, path: &Path) -> Result<Metadata>;

    /// Open a file or directory for reading.
    async fn open(&self, path: &Path) -> Result<Box<dyn File>> {
        self.open_file(path, OpenOptions::new().read(true), 0).await
    }

    /// Open a file with explicit flags.
    ///
    /// `mode` is applied only when the file is created.
    async fn open_file(
        &self,
        path: &Path,
        options: OpenOptions,
        mode: u32,
    ) -> Result<Box<dyn File>>;

    /// Create or truncate a file and open it read-write.
    async fn create(&self, path: &Path) -> Result<Box<dyn File>> {
        let options = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true);
        self.open_file(path, options, DEFAULT_FILE_MODE).await
    }

    /// Remove a file or an empty directory.
    async fn remove(&self, path: &Path) -> Result<()>;

    /// Remove a file or a directory with everything below it.
    async fn remove_all(&self, path: &Path) -> Result<()>;

    /// Rename/move a file or directory.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Change access and modification times.
    async fn set_times(&self, path: &Path, accessed: SystemTime, modified: SystemTime)
    -> Result<()>;

    /// Change file permissions.
    async fn chmod(&self, path: &Path, mode: u32) -> Result<()>;

    /// Create a directory. The parent must exist.
    async fn mkdir(&self, path: &Path, mode: u32) -> Result<()>;

    /// Create a directory and any missing ancestors.
    async fn mkdir_all(&self, path: &Path, mode: u32) -> Result<()>;

    /// Check if a path exists.
    async fn exists(&self, path: &Path) -> Result<bool> {
        match self.stat(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Read a file's contents.
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let mut file = self.open(path).await?;
        let content = file.read_to_end().await?;
        file.close().await?;
        Ok(content)
    }

    /// Replace a file's contents, creating it if needed.
    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<()> {
        let mut file = self.create(path).await?;
        file.write_all(content).await?;
        file.close().await
    }
}

/// An open file or directory handle.
#[async_trait]
pub trait File: Send + Sync {
    /// Path this handle was opened with.
    fn name(&self) -> &Path;

    /// Metadata of the underlying entry.
    async fn stat(&self) -> Result<Metadata>;

    /// Read into `buf` from the current position. Returns 0 at end of file.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write `data` at the current position (or at the end in append mode).
    async fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// List directory entries.
    async fn read_dir(&mut self) -> Result<Vec<DirEntry>>;

    /// Flush and release the handle.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Read everything from the current position to the end.
    async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    /// Write the whole buffer.
    async fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let n = self.write(data).await?;
            if n == 0 {
                return Err(Error::other("failed to write whole buffer"));
            }
            data = &data[n..];
        }
        Ok(())
    }
}

/// Flags for [`FileSystem::open_file`].
///
/// Mirrors `std::fs::OpenOptions`. A read-write open is `read(true).write(true)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOptions {
    pub read: bool,
    pub write: bool,
    pub append: bool,
    pub create: bool,
    pub truncate: bool,
}

impl OpenOptions {
    /// All flags cleared.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    pub fn write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    /// True if opening with these flags may change the file.
    pub fn is_mutating(&self) -> bool {
        self.write || self.append || self.create || self.truncate
    }

    /// True if the handle may be written through.
    pub fn is_writable(&self) -> bool {
        self.write || self.append
    }
}

/// File metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    /// File type
    pub file_type: FileType,
    /// File size in bytes
    pub size: u64,
    /// File permissions (Unix mode)
    pub mode: u32,
    /// Last access time
    pub accessed: SystemTime,
    /// Last modification time
    pub modified: SystemTime,
    /// Creation time
    pub created: SystemTime,
}

impl Default for Metadata {
    fn default() -> Self {
        let now = SystemTime::now();
        Self {
            file_type: FileType::File,
            size: 0,
            mode: 0o644,
            accessed: now,
            modified: now,
            created: now,
        }
    }
}

impl Metadata {
    /// Metadata for a fresh directory.
    pub fn directory(mode: u32) -> Self {
        Self {
            file_type: FileType::Directory,
            mode,
            ..Self::default()
        }
    }

    /// Metadata for a fresh, empty file.
    pub fn file(mode: u32) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn is_dir(&self) -> bool {
        self.file_type.is_dir()
    }
}

/// File type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Regular file
    File,
    /// Directory
    Directory,
}

impl FileType {
    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq)]
pub struct DirEntry {
    /// Entry name (not full path)
    pub name: String,
    /// Entry metadata
    pub metadata: Metadata,
}
