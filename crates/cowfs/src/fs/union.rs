//! Merged directory handle.
//!
//! [`MergedDir`] is what [`CopyOnWriteFs::open`](super::CopyOnWriteFs) hands back
//! for a directory that exists in the overlay: it holds a handle into each
//! layer and merges their listings on read.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;

use super::traits::{DirEntry, File, Metadata};
use crate::error::{Error, Result};

/// Read-only union of a base-side and an overlay-side directory handle.
///
/// Either half may be missing, but not both. When both layers list the same
/// name, the overlay entry wins.
pub struct MergedDir {
    halves: Halves,
}

enum Halves {
    Both {
        base: Box<dyn File>,
        layer: Box<dyn File>,
    },
    BaseOnly(Box<dyn File>),
    LayerOnly(Box<dyn File>),
}

impl MergedDir {
    /// Combine two directory handles.
    ///
    /// Fails with [`Error::NotFound`] when neither half is present.
    pub fn new(base: Option<Box<dyn File>>, layer: Option<Box<dyn File>>) -> Result<Self> {
        let halves = match (base, layer) {
            (Some(base), Some(layer)) => Halves::Both { base, layer },
            (Some(base), None) => Halves::BaseOnly(base),
            (None, Some(layer)) => Halves::LayerOnly(layer),
            (None, None) => return Err(Error::NotFound),
        };
        Ok(Self { halves })
    }

    /// True if a base-side handle was opened.
    pub fn has_base(&self) -> bool {
        !matches!(self.halves, Halves::LayerOnly(_))
    }

    /// True if an overlay-side handle was opened.
    pub fn has_layer(&self) -> bool {
        !matches!(self.halves, Halves::BaseOnly(_))
    }

    /// The overlay half when present, else the base half.
    fn primary(&self) -> &dyn File {
        match &self.halves {
            Halves::Both { layer, .. } | Halves::LayerOnly(layer) => layer.as_ref(),
            Halves::BaseOnly(base) => base.as_ref(),
        }
    }

    fn primary_mut(&mut self) -> &mut dyn File {
        match &mut self.halves {
            Halves::Both { layer, .. } | Halves::LayerOnly(layer) => layer.as_mut(),
            Halves::BaseOnly(base) => base.as_mut(),
        }
    }
}

#[async_trait]
impl File for MergedDir {
    fn name(&self) -> &Path {
        self.primary().name()
    }

    async fn stat(&self) -> Result<Metadata> {
        self.primary().stat().await
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.primary_mut().read(buf).await
    }

    async fn write(&mut self, _data: &[u8]) -> Result<usize> {
        Err(Error::PermissionDenied)
    }

    async fn read_dir(&mut self) -> Result<Vec<DirEntry>> {
        let (base, layer) = match &mut self.halves {
            Halves::Both { base, layer } => (Some(base), Some(layer)),
            Halves::BaseOnly(base) => (Some(base), None),
            Halves::LayerOnly(layer) => (None, Some(layer)),
        };

        let mut merged = BTreeMap::new();
        if let Some(base) = base {
            for entry in base.read_dir().await? {
                merged.insert(entry.name.clone(), entry);
            }
        }
        if let Some(layer) = layer {
            for entry in layer.read_dir().await? {
                merged.insert(entry.name.clone(), entry);
            }
        }

        Ok(merged.into_values().collect())
    }

    async fn close(&mut self) -> Result<()> {
        match &mut self.halves {
            Halves::Both { base, layer } => {
                let layer = layer.close().await;
                let base = base.close().await;
                layer.and(base)
            }
            Halves::BaseOnly(half) | Halves::LayerOnly(half) => half.close().await,
        }
    }
}
