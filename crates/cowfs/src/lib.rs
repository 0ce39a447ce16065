//! cowfs - Copy-on-write layered filesystem
//!
//! Presents the union of a read-only base filesystem and a writable overlay.
//! Every change lands in the overlay; a file that exists only in the base is
//! copied up to the overlay the first time it is changed.
//!
//! # Example
//!
//! ```rust
//! use cowfs::{CopyOnWriteFs, Error, FileSystem, InMemoryFs, ReadOnlyFs};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let base = Arc::new(InMemoryFs::new());
//!     base.write_file(Path::new("/a.txt"), b"hello").await?;
//!
//!     let fs = CopyOnWriteFs::new(
//!         Arc::new(ReadOnlyFs::new(base.clone())),
//!         Arc::new(InMemoryFs::new()),
//!     );
//!
//!     fs.write_file(Path::new("/a.txt"), b"world").await?;
//!     assert_eq!(fs.read_file(Path::new("/a.txt")).await?, b"world");
//!     assert_eq!(base.read_file(Path::new("/a.txt")).await?, b"hello");
//!
//!     // Files that only live in the base cannot be renamed or removed
//!     base.write_file(Path::new("/only-base.txt"), b"").await?;
//!     let denied = fs.remove(Path::new("/only-base.txt")).await;
//!     assert!(matches!(denied, Err(Error::PermissionDenied)));
//!     Ok(())
//! }
//! ```

mod error;
mod fs;
pub mod logging;

pub use async_trait::async_trait;
pub use error::{Error, Result};
pub use fs::{
    CopyOnWriteFs, DEFAULT_FILE_MODE, DirEntry, File, FileSystem, FileType, InMemoryFs, MergedDir,
    Metadata, OpenOptions, Presence, ReadOnlyFs, copy_to_layer,
};

#[cfg(feature = "realfs")]
pub use fs::RealFs;
