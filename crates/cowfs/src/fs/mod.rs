//! Virtual filesystem for cowfs
//!
//! Provides an async filesystem trait and implementations:
//! - `InMemoryFs`: Simple in-memory filesystem
//! - `ReadOnlyFs`: Read-only view of another filesystem
//! - `RealFs`: Host directory (requires the `realfs` feature)
//! - `CopyOnWriteFs`: Writable overlay on top of a read-only base

mod copy;
mod memory;
mod overlay;
mod readonly;
#[cfg(feature = "realfs")]
mod realfs;
mod traits;
mod union;

pub use copy::copy_to_layer;
pub use memory::InMemoryFs;
pub use overlay::{CopyOnWriteFs, Presence};
pub use readonly::ReadOnlyFs;
#[cfg(feature = "realfs")]
pub use realfs::RealFs;
pub use traits::{DEFAULT_FILE_MODE, DirEntry, File, FileSystem, FileType, Metadata, OpenOptions};
pub use union::MergedDir;
