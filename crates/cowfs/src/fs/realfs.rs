//! Host filesystem backend.
//!
//! [`RealFs`] exposes one directory of the host as a [`FileSystem`]. Every
//! path is resolved below that root; `..` cannot climb out of it.
//!
//! Only compiled with the `realfs` feature.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::traits::{DirEntry, File, FileSystem, FileType, Metadata, OpenOptions};
use crate::error::{Error, Result};

/// Filesystem rooted at a host directory.
pub struct RealFs {
    root: PathBuf,
}

impl RealFs {
    /// Serve the contents of `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Host directory backing this filesystem.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a virtual path onto the host, clamped to the root.
    fn resolve(&self, path: &Path) -> PathBuf {
        let mut relative = PathBuf::new();
        for component in path.components() {
            match component {
                Component::Normal(name) => relative.push(name),
                Component::ParentDir => {
                    relative.pop();
                }
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            }
        }
        self.root.join(relative)
    }
}

fn convert_metadata(meta: &std::fs::Metadata) -> Metadata {
    let file_type = if meta.is_dir() {
        FileType::Directory
    } else {
        FileType::File
    };

    #[cfg(unix)]
    let mode = {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o7777
    };
    #[cfg(not(unix))]
    let mode = if meta.permissions().readonly() {
        0o444
    } else {
        0o644
    };

    let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    Metadata {
        file_type,
        size: meta.len(),
        mode,
        accessed: meta.accessed().unwrap_or(modified),
        modified,
        created: meta.created().unwrap_or(modified),
    }
}

#[async_trait]
impl FileSystem for RealFs {
    fn name(&self) -> &str {
        "RealFs"
    }

    async fn stat(&self, path: &Path) -> Result<Metadata> {
        let meta = tokio::fs::metadata(self.resolve(path)).await?;
        Ok(convert_metadata(&meta))
    }

    async fn open_file(
        &self,
        path: &Path,
        options: OpenOptions,
        mode: u32,
    ) -> Result<Box<dyn File>> {
        let real = self.resolve(path);

        if let Ok(meta) = tokio::fs::metadata(&real).await {
            if meta.is_dir() {
                if options.is_writable() || options.truncate {
                    return Err(Error::other("is a directory"));
                }
                return Ok(Box::new(RealFile {
                    name: path.to_path_buf(),
                    real,
                    is_dir: true,
                    file: None,
                }));
            }
        }

        let mut open = tokio::fs::OpenOptions::new();
        open.read(options.read || !options.is_writable())
            .write(options.write)
            .append(options.append)
            .create(options.create)
            .truncate(options.truncate && options.is_writable());
        #[cfg(unix)]
        open.mode(mode);
        #[cfg(not(unix))]
        let _ = mode;
        // std refuses create without a write mode; create-only opens still make the file
        if options.create && !options.is_writable() {
            open.write(true);
        }

        let file = open.open(&real).await?;
        Ok(Box::new(RealFile {
            name: path.to_path_buf(),
            real,
            is_dir: false,
            file: Some(file),
        }))
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        let real = self.resolve(path);
        let meta = tokio::fs::symlink_metadata(&real).await?;
        if meta.is_dir() {
            tokio::fs::remove_dir(&real).await?;
        } else {
            tokio::fs::remove_file(&real).await?;
        }
        Ok(())
    }

    async fn remove_all(&self, path: &Path) -> Result<()> {
        let real = self.resolve(path);
        if real == self.root {
            return Err(Error::PermissionDenied);
        }
        let meta = tokio::fs::symlink_metadata(&real).await?;
        if meta.is_dir() {
            tokio::fs::remove_dir_all(&real).await?;
        } else {
            tokio::fs::remove_file(&real).await?;
        }
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        tokio::fs::rename(self.resolve(from), self.resolve(to)).await?;
        Ok(())
    }

    async fn set_times(
        &self,
        path: &Path,
        accessed: SystemTime,
        modified: SystemTime,
    ) -> Result<()> {
        let real = self.resolve(path);
        let joined = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let file = std::fs::File::options().read(true).open(&real)?;
            let times = std::fs::FileTimes::new()
                .set_accessed(accessed)
                .set_modified(modified);
            file.set_times(times)
        })
        .await;

        match joined {
            Ok(result) => Ok(result?),
            Err(_) => Err(Error::other("set_times task failed")),
        }
    }

    async fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        let real = self.resolve(path);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&real, std::fs::Permissions::from_mode(mode)).await?;
        }
        #[cfg(not(unix))]
        {
            let mut perms = tokio::fs::metadata(&real).await?.permissions();
            perms.set_readonly(mode & 0o222 == 0);
            tokio::fs::set_permissions(&real, perms).await?;
        }
        Ok(())
    }

    async fn mkdir(&self, path: &Path, mode: u32) -> Result<()> {
        let real = self.resolve(path);
        match tokio::fs::create_dir(&real).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(Error::AlreadyExists);
            }
            Err(e) => return Err(e.into()),
        }
        self.chmod(path, mode).await
    }

    async fn mkdir_all(&self, path: &Path, mode: u32) -> Result<()> {
        let real = self.resolve(path);
        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(mode);
        #[cfg(not(unix))]
        let _ = mode;
        builder.create(&real).await?;
        Ok(())
    }
}

/// Handle into a [`RealFs`]. Directories carry no OS handle.
struct RealFile {
    name: PathBuf,
    real: PathBuf,
    is_dir: bool,
    file: Option<tokio::fs::File>,
}

impl RealFile {
    fn handle(&mut self) -> Result<&mut tokio::fs::File> {
        match self.file.as_mut() {
            Some(file) => Ok(file),
            None if self.is_dir => Err(Error::other("is a directory")),
            None => Err(Error::other("file already closed")),
        }
    }
}

#[async_trait]
impl File for RealFile {
    fn name(&self) -> &Path {
        &self.name
    }

    async fn stat(&self) -> Result<Metadata> {
        let meta = match &self.file {
            Some(file) => file.metadata().await?,
            None => tokio::fs::metadata(&self.real).await?,
        };
        Ok(convert_metadata(&meta))
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.handle()?.read(buf).await?)
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(self.handle()?.write(data).await?)
    }

    async fn read_dir(&mut self) -> Result<Vec<DirEntry>> {
        if !self.is_dir {
            return Err(Error::other("not a directory"));
        }
        let mut reader = tokio::fs::read_dir(&self.real).await?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let metadata = entry.metadata().await?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                metadata: convert_metadata(&metadata),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        Ok(())
    }
}
