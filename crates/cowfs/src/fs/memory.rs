//! In-memory filesystem implementation

// RwLock.read()/write().unwrap() only panics on lock poisoning (prior panic
// while holding lock). This is intentional - corrupted state should not propagate.
#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use super::traits::{DirEntry, File, FileSystem, Metadata, OpenOptions};
use crate::error::{Error, Result};

type Entries = Arc<RwLock<HashMap<PathBuf, FsEntry>>>;

/// In-memory filesystem.
///
/// Stores all files and directories in memory using a HashMap. Open handles
/// share the map, so a write through a handle is visible to `stat` and to
/// other handles immediately.
pub struct InMemoryFs {
    entries: Entries,
}

#[derive(Debug, Clone)]
enum FsEntry {
    File { content: Vec<u8>, metadata: Metadata },
    Directory { metadata: Metadata },
}

impl FsEntry {
    fn metadata(&self) -> &Metadata {
        match self {
            FsEntry::File { metadata, .. } | FsEntry::Directory { metadata } => metadata,
        }
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        match self {
            FsEntry::File { metadata, .. } | FsEntry::Directory { metadata } => metadata,
        }
    }

    fn is_dir(&self) -> bool {
        matches!(self, FsEntry::Directory { .. })
    }
}

impl Default for InMemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFs {
    /// Create a new in-memory filesystem holding only `/`.
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            PathBuf::from("/"),
            FsEntry::Directory {
                metadata: Metadata::directory(0o755),
            },
        );

        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    pub(crate) fn normalize_path(path: &Path) -> PathBuf {
        let mut result = PathBuf::new();

        for component in path.components() {
            match component {
                Component::RootDir => {
                    result.push("/");
                }
                Component::Normal(name) => {
                    if result.as_os_str().is_empty() {
                        result.push("/");
                    }
                    result.push(name);
                }
                Component::ParentDir => {
                    result.pop();
                }
                Component::CurDir => {}
                Component::Prefix(_) => {}
            }
        }

        if result.as_os_str().is_empty() {
            result.push("/");
        }

        result
    }

    /// Parent must exist and be a directory.
    fn check_parent(entries: &HashMap<PathBuf, FsEntry>, path: &Path) -> Result<()> {
        let Some(parent) = path.parent() else {
            return Ok(());
        };
        match entries.get(parent) {
            Some(FsEntry::Directory { .. }) => Ok(()),
            Some(FsEntry::File { .. }) => Err(Error::other("not a directory")),
            None => Err(Error::NotFound),
        }
    }

    fn has_children(entries: &HashMap<PathBuf, FsEntry>, path: &Path) -> bool {
        entries
            .keys()
            .any(|p| p != path && p.parent() == Some(path))
    }
}

#[async_trait]
impl FileSystem for InMemoryFs {
    fn name(&self) -> &str {
        "InMemoryFs"
    }

    async fn stat(&self, path: &Path) -> Result<Metadata> {
        let path = Self::normalize_path(path);
        let entries = self.entries.read().unwrap();

        entries
            .get(&path)
            .map(|entry| entry.metadata().clone())
            .ok_or(Error::NotFound)
    }

    async fn open_file(
        &self,
        path: &Path,
        options: OpenOptions,
        mode: u32,
    ) -> Result<Box<dyn File>> {
        let name = path.to_path_buf();
        let path = Self::normalize_path(path);
        let mut entries = self.entries.write().unwrap();

        match entries.get_mut(&path) {
            Some(FsEntry::Directory { .. }) => {
                if options.is_writable() || options.truncate {
                    return Err(Error::other("is a directory"));
                }
            }
            Some(FsEntry::File { content, metadata }) => {
                if options.truncate && options.is_writable() {
                    content.clear();
                    metadata.size = 0;
                    metadata.modified = SystemTime::now();
                }
            }
            None => {
                if !options.create {
                    return Err(Error::NotFound);
                }
                Self::check_parent(&entries, &path)?;
                entries.insert(
                    path.clone(),
                    FsEntry::File {
                        content: Vec::new(),
                        metadata: Metadata::file(mode),
                    },
                );
            }
        }

        Ok(Box::new(MemFile {
            name,
            path,
            entries: Arc::clone(&self.entries),
            options,
            offset: 0,
        }))
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        let path = Self::normalize_path(path);
        let mut entries = self.entries.write().unwrap();

        match entries.get(&path) {
            Some(FsEntry::Directory { .. }) => {
                if Self::has_children(&entries, &path) {
                    return Err(Error::other("directory not empty"));
                }
                entries.remove(&path);
            }
            Some(FsEntry::File { .. }) => {
                entries.remove(&path);
            }
            None => return Err(Error::NotFound),
        }

        Ok(())
    }

    async fn remove_all(&self, path: &Path) -> Result<()> {
        let path = Self::normalize_path(path);
        let mut entries = self.entries.write().unwrap();

        if !entries.contains_key(&path) {
            return Err(Error::NotFound);
        }

        // The root itself always survives
        let root = Path::new("/");
        let to_remove: Vec<PathBuf> = entries
            .keys()
            .filter(|p| p.starts_with(&path) && p.as_path() != root)
            .cloned()
            .collect();

        for p in to_remove {
            entries.remove(&p);
        }

        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = Self::normalize_path(from);
        let to = Self::normalize_path(to);
        let mut entries = self.entries.write().unwrap();

        let source_is_dir = match entries.get(&from) {
            Some(entry) => entry.is_dir(),
            None => return Err(Error::NotFound),
        };
        if from == to {
            return Ok(());
        }
        if to.starts_with(&from) {
            return Err(Error::other("invalid argument"));
        }
        Self::check_parent(&entries, &to)?;

        match entries.get(&to) {
            Some(FsEntry::Directory { .. }) if !source_is_dir => {
                return Err(Error::other("is a directory"));
            }
            Some(FsEntry::File { .. }) if source_is_dir => {
                return Err(Error::other("not a directory"));
            }
            Some(FsEntry::Directory { .. }) if Self::has_children(&entries, &to) => {
                return Err(Error::other("directory not empty"));
            }
            _ => {}
        }

        let moved: Vec<PathBuf> = entries
            .keys()
            .filter(|p| p.starts_with(&from))
            .cloned()
            .collect();

        for old in moved {
            if let Some(entry) = entries.remove(&old) {
                let new = match old.strip_prefix(&from) {
                    Ok(rest) if !rest.as_os_str().is_empty() => to.join(rest),
                    _ => to.clone(),
                };
                entries.insert(new, entry);
            }
        }

        Ok(())
    }

    async fn set_times(
        &self,
        path: &Path,
        accessed: SystemTime,
        modified: SystemTime,
    ) -> Result<()> {
        let path = Self::normalize_path(path);
        let mut entries = self.entries.write().unwrap();

        let metadata = entries
            .get_mut(&path)
            .ok_or(Error::NotFound)?
            .metadata_mut();
        metadata.accessed = accessed;
        metadata.modified = modified;
        Ok(())
    }

    async fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        let path = Self::normalize_path(path);
        let mut entries = self.entries.write().unwrap();

        entries
            .get_mut(&path)
            .ok_or(Error::NotFound)?
            .metadata_mut()
            .mode = mode;
        Ok(())
    }

    async fn mkdir(&self, path: &Path, mode: u32) -> Result<()> {
        let path = Self::normalize_path(path);
        let mut entries = self.entries.write().unwrap();

        if entries.contains_key(&path) {
            return Err(Error::AlreadyExists);
        }
        Self::check_parent(&entries, &path)?;

        entries.insert(
            path,
            FsEntry::Directory {
                metadata: Metadata::directory(mode),
            },
        );
        Ok(())
    }

    async fn mkdir_all(&self, path: &Path, mode: u32) -> Result<()> {
        let path = Self::normalize_path(path);
        let mut entries = self.entries.write().unwrap();

        let mut current = PathBuf::from("/");
        for component in path.components().skip(1) {
            current.push(component);
            match entries.get(&current) {
                Some(FsEntry::Directory { .. }) => {}
                Some(FsEntry::File { .. }) => return Err(Error::other("not a directory")),
                None => {
                    entries.insert(
                        current.clone(),
                        FsEntry::Directory {
                            metadata: Metadata::directory(mode),
                        },
                    );
                }
            }
        }

        Ok(())
    }
}

/// Handle into an [`InMemoryFs`].
struct MemFile {
    name: PathBuf,
    path: PathBuf,
    entries: Entries,
    options: OpenOptions,
    offset: usize,
}

impl MemFile {
    // O_RDONLY is the absence of write flags, so a bare handle can read.
    fn readable(&self) -> bool {
        self.options.read || !self.options.is_writable()
    }
}

#[async_trait]
impl File for MemFile {
    fn name(&self) -> &Path {
        &self.name
    }

    async fn stat(&self) -> Result<Metadata> {
        let entries = self.entries.read().unwrap();
        entries
            .get(&self.path)
            .map(|entry| entry.metadata().clone())
            .ok_or(Error::NotFound)
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.readable() {
            return Err(Error::other("file not opened for reading"));
        }
        let entries = self.entries.read().unwrap();

        match entries.get(&self.path) {
            Some(FsEntry::File { content, .. }) => {
                if self.offset >= content.len() {
                    return Ok(0);
                }
                let n = buf.len().min(content.len() - self.offset);
                buf[..n].copy_from_slice(&content[self.offset..self.offset + n]);
                self.offset += n;
                Ok(n)
            }
            Some(FsEntry::Directory { .. }) => Err(Error::other("is a directory")),
            None => Err(Error::NotFound),
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        if !self.options.is_writable() {
            return Err(Error::other("file not opened for writing"));
        }
        let mut entries = self.entries.write().unwrap();

        match entries.get_mut(&self.path) {
            Some(FsEntry::File { content, metadata }) => {
                if self.options.append {
                    self.offset = content.len();
                }
                let end = self.offset + data.len();
                if content.len() < end {
                    content.resize(end, 0);
                }
                content[self.offset..end].copy_from_slice(data);
                self.offset = end;
                metadata.size = content.len() as u64;
                metadata.modified = SystemTime::now();
                Ok(data.len())
            }
            Some(FsEntry::Directory { .. }) => Err(Error::other("is a directory")),
            None => Err(Error::NotFound),
        }
    }

    async fn read_dir(&mut self) -> Result<Vec<DirEntry>> {
        let entries = self.entries.read().unwrap();

        match entries.get(&self.path) {
            Some(FsEntry::Directory { .. }) => {
                let mut result: Vec<DirEntry> = entries
                    .iter()
                    .filter(|(p, _)| p.parent() == Some(self.path.as_path()))
                    .map(|(p, entry)| DirEntry {
                        name: p
                            .file_name()
                            .map(|n| n.to_string_lossy().to_string())
                            .unwrap_or_default(),
                        metadata: entry.metadata().clone(),
                    })
                    .collect();
                result.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(result)
            }
            Some(FsEntry::File { .. }) => Err(Error::other("not a directory")),
            None => Err(Error::NotFound),
        }
    }
}
