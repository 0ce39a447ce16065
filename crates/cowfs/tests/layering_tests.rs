//! End-to-end layering scenarios
//!
//! Each test builds a base and an overlay, drives them through the public
//! `CopyOnWriteFs` API only, and then inspects both layers directly.

use cowfs::{
    CopyOnWriteFs, Error, FileSystem, InMemoryFs, OpenOptions, Presence, ReadOnlyFs,
};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

struct Fixture {
    base: Arc<InMemoryFs>,
    layer: Arc<InMemoryFs>,
    fs: CopyOnWriteFs,
}

fn fixture() -> Fixture {
    let base = Arc::new(InMemoryFs::new());
    let layer = Arc::new(InMemoryFs::new());
    let fs = CopyOnWriteFs::new(Arc::new(ReadOnlyFs::new(base.clone())), layer.clone());
    Fixture { base, layer, fs }
}

async fn names(fs: &dyn FileSystem, dir: &str) -> Vec<String> {
    let mut handle = fs.open(Path::new(dir)).await.unwrap();
    let entries = handle.read_dir().await.unwrap();
    handle.close().await.unwrap();
    entries.into_iter().map(|e| e.name).collect()
}

mod scenarios {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn write_to_base_only_file_lands_in_overlay() {
        let f = fixture();
        f.base.write_file(Path::new("/a.txt"), b"hello").await.unwrap();
        f.base.chmod(Path::new("/a.txt"), 0o644).await.unwrap();

        let options = OpenOptions::new().write(true).create(true);
        let mut file = f
            .fs
            .open_file(Path::new("/a.txt"), options, 0o644)
            .await
            .unwrap();
        file.write_all(b"world").await.unwrap();
        file.close().await.unwrap();

        assert_eq!(f.layer.read_file(Path::new("/a.txt")).await.unwrap(), b"world");
        assert_eq!(f.base.read_file(Path::new("/a.txt")).await.unwrap(), b"hello");
        assert_eq!(f.fs.read_file(Path::new("/a.txt")).await.unwrap(), b"world");
    }

    #[tokio::test]
    async fn directory_in_both_layers_lists_each_name_once() {
        let f = fixture();
        f.layer.mkdir(Path::new("/d"), 0o755).await.unwrap();
        f.layer.write_file(Path::new("/d/x"), b"").await.unwrap();
        f.base.mkdir(Path::new("/d"), 0o755).await.unwrap();
        f.base.write_file(Path::new("/d/y"), b"").await.unwrap();

        assert_eq!(names(&f.fs, "/d").await, vec!["x", "y"]);
    }

    #[tokio::test]
    async fn base_only_file_cannot_be_removed_or_renamed() {
        let f = fixture();
        f.base
            .write_file(Path::new("/only-base.txt"), b"keep")
            .await
            .unwrap();

        assert!(matches!(
            f.fs.remove(Path::new("/only-base.txt")).await,
            Err(Error::PermissionDenied)
        ));
        assert!(matches!(
            f.fs.rename(Path::new("/only-base.txt"), Path::new("/z.txt")).await,
            Err(Error::PermissionDenied)
        ));
        assert!(!f.fs.exists(Path::new("/z.txt")).await.unwrap());
        assert!(f.fs.exists(Path::new("/only-base.txt")).await.unwrap());
    }
}

mod properties {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn stat_of_base_only_path_is_base_metadata() {
        let f = fixture();
        f.base.write_file(Path::new("/f"), b"12345").await.unwrap();
        f.base.chmod(Path::new("/f"), 0o640).await.unwrap();

        let via_union = f.fs.stat(Path::new("/f")).await.unwrap();
        let via_base = f.base.stat(Path::new("/f")).await.unwrap();
        assert_eq!(via_union, via_base);
    }

    #[tokio::test]
    async fn removing_shadowing_copy_resurfaces_base() {
        let f = fixture();
        f.base.write_file(Path::new("/f"), b"base").await.unwrap();
        f.fs.write_file(Path::new("/f"), b"overlay copy").await.unwrap();
        assert_eq!(f.fs.stat(Path::new("/f")).await.unwrap().size, 12);

        f.fs.remove(Path::new("/f")).await.unwrap();

        assert!(!f.layer.exists(Path::new("/f")).await.unwrap());
        assert_eq!(
            f.fs.stat(Path::new("/f")).await.unwrap(),
            f.base.stat(Path::new("/f")).await.unwrap()
        );
        assert_eq!(f.fs.classify(Path::new("/f")).await.unwrap(), Presence::BaseOnly);
    }

    #[tokio::test]
    async fn copy_up_keeps_untouched_fields() {
        let f = fixture();
        let then = SystemTime::UNIX_EPOCH + Duration::from_secs(86_400);
        f.base.write_file(Path::new("/f"), b"content").await.unwrap();
        f.base.chmod(Path::new("/f"), 0o600).await.unwrap();
        f.base.set_times(Path::new("/f"), then, then).await.unwrap();

        f.fs.chmod(Path::new("/f"), 0o644).await.unwrap();

        let meta = f.layer.stat(Path::new("/f")).await.unwrap();
        assert_eq!(meta.mode, 0o644);
        assert_eq!(meta.modified, then);
        assert_eq!(f.layer.read_file(Path::new("/f")).await.unwrap(), b"content");

        let base_meta = f.base.stat(Path::new("/f")).await.unwrap();
        assert_eq!(base_meta.mode, 0o600);
    }

    #[tokio::test]
    async fn copy_up_creates_missing_overlay_parents() {
        let f = fixture();
        f.base.mkdir_all(Path::new("/etc/app"), 0o755).await.unwrap();
        f.base
            .write_file(Path::new("/etc/app/app.conf"), b"debug=false")
            .await
            .unwrap();

        f.fs
            .write_file(Path::new("/etc/app/app.conf"), b"debug=true")
            .await
            .unwrap();

        assert!(f.layer.stat(Path::new("/etc/app")).await.unwrap().is_dir());
        assert_eq!(
            f.base.read_file(Path::new("/etc/app/app.conf")).await.unwrap(),
            b"debug=false"
        );
    }

    #[tokio::test]
    async fn transition_to_overlay_is_sticky() {
        let f = fixture();
        f.base.write_file(Path::new("/f"), b"base").await.unwrap();
        assert_eq!(f.fs.classify(Path::new("/f")).await.unwrap(), Presence::BaseOnly);

        f.fs.chmod(Path::new("/f"), 0o600).await.unwrap();
        for _ in 0..3 {
            assert_eq!(
                f.fs.classify(Path::new("/f")).await.unwrap(),
                Presence::OverlayPresent
            );
            // Later writes must not copy the base over the overlay again
            f.fs.write_file(Path::new("/f"), b"mine").await.unwrap();
            assert_eq!(f.fs.read_file(Path::new("/f")).await.unwrap(), b"mine");
        }
    }

    #[tokio::test]
    async fn mkdir_rules() {
        let f = fixture();
        f.base.mkdir(Path::new("/base-dir"), 0o755).await.unwrap();

        assert!(matches!(
            f.fs.mkdir(Path::new("/base-dir"), 0o755).await,
            Err(Error::AlreadyExists)
        ));
        assert!(matches!(
            f.fs.mkdir_all(Path::new("/base-dir"), 0o755).await,
            Err(Error::AlreadyExists)
        ));

        f.fs.mkdir(Path::new("/new-dir"), 0o755).await.unwrap();
        assert_eq!(
            f.fs.classify(Path::new("/new-dir")).await.unwrap(),
            Presence::OverlayPresent
        );
    }

    #[tokio::test]
    async fn nested_directory_under_base_dir_merges() {
        let f = fixture();
        f.base.mkdir(Path::new("/d"), 0o755).await.unwrap();
        f.base.write_file(Path::new("/d/old"), b"").await.unwrap();

        // Copying up a file also brings its directory into the overlay
        f.fs.write_file(Path::new("/d/old"), b"changed").await.unwrap();
        f.layer.write_file(Path::new("/d/new"), b"").await.unwrap();

        assert_eq!(names(&f.fs, "/d").await, vec!["new", "old"]);
    }
}

mod composition {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn union_can_be_the_base_of_another_union() {
        let bottom = Arc::new(InMemoryFs::new());
        bottom.write_file(Path::new("/f"), b"bottom").await.unwrap();
        let middle = Arc::new(InMemoryFs::new());
        let lower: Arc<dyn FileSystem> = Arc::new(CopyOnWriteFs::new(bottom.clone(), middle));
        let top = Arc::new(InMemoryFs::new());
        let fs = CopyOnWriteFs::new(Arc::new(ReadOnlyFs::new(lower.clone())), top.clone());

        fs.write_file(Path::new("/f"), b"top").await.unwrap();

        assert_eq!(top.read_file(Path::new("/f")).await.unwrap(), b"top");
        assert_eq!(lower.read_file(Path::new("/f")).await.unwrap(), b"bottom");
        assert_eq!(bottom.read_file(Path::new("/f")).await.unwrap(), b"bottom");
    }

    #[tokio::test]
    async fn reports_its_name() {
        assert_eq!(fixture().fs.name(), "CopyOnWriteFs");
    }
}
