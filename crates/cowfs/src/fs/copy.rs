//! Copy-up of a base entry into the overlay.

use std::path::Path;

use super::traits::{File, FileSystem};
use crate::error::{Error, Result};

const COPY_BUF_SIZE: usize = 32 * 1024;

/// Copy `path` from `base` into `layer`, keeping mode and timestamps.
///
/// Directories are recreated (with any missing ancestors); files get their
/// parent directory created in the layer when it is missing, then their
/// content streamed across. If anything fails once the layer file exists, the
/// partial copy is removed again before the error is returned.
pub async fn copy_to_layer(
    base: &dyn FileSystem,
    layer: &dyn FileSystem,
    path: &Path,
) -> Result<()> {
    let meta = base.stat(path).await?;

    if meta.is_dir() {
        layer.mkdir_all(path, meta.mode).await?;
        layer.chmod(path, meta.mode).await?;
        return layer.set_times(path, meta.accessed, meta.modified).await;
    }

    let mut src = base.open(path).await?;

    if let Some(parent) = path.parent()
        && !layer.exists(parent).await?
    {
        layer.mkdir_all(parent, 0o777).await?;
    }

    let mut dst = layer.create(path).await?;
    let copied = match copy_bytes(src.as_mut(), dst.as_mut()).await {
        Ok(n) => n,
        Err(e) => {
            let _ = dst.close().await;
            let _ = layer.remove(path).await;
            return Err(e);
        }
    };
    let _ = src.close().await;

    if copied != meta.size {
        let _ = dst.close().await;
        let _ = layer.remove(path).await;
        return Err(Error::other("short copy to overlay"));
    }

    if let Err(e) = dst.close().await {
        let _ = layer.remove(path).await;
        return Err(e);
    }

    let finish = async {
        layer.chmod(path, meta.mode).await?;
        layer.set_times(path, meta.accessed, meta.modified).await
    };
    if let Err(e) = finish.await {
        let _ = layer.remove(path).await;
        return Err(e);
    }

    Ok(())
}

async fn copy_bytes(src: &mut dyn File, dst: &mut dyn File) -> Result<u64> {
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    let mut total = 0u64;
    loop {
        let n = src.read(&mut buf).await?;
        if n == 0 {
            return Ok(total);
        }
        dst.write_all(&buf[..n]).await?;
        total += n as u64;
    }
}
