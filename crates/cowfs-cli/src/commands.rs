//! Subcommands and their execution against a `CopyOnWriteFs`

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use cowfs::{CopyOnWriteFs, FileSystem, OpenOptions, Presence, copy_to_layer};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show type, size, mode and owning layer of a path
    Stat { path: PathBuf },

    /// Print a file's contents
    Cat { path: PathBuf },

    /// Write a file (contents from --data or stdin)
    Write {
        path: PathBuf,
        /// Inline contents instead of stdin
        #[arg(long)]
        data: Option<String>,
        /// Append instead of truncating
        #[arg(long)]
        append: bool,
        /// Mode for newly created files (octal)
        #[arg(long, value_parser = parse_mode, default_value = "644")]
        mode: u32,
    },

    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: PathBuf,
    },

    /// Remove a file or empty directory
    Rm {
        path: PathBuf,
        /// Remove recursively
        #[arg(short, long)]
        recursive: bool,
    },

    /// Rename a path
    Mv { from: PathBuf, to: PathBuf },

    /// Create a directory
    Mkdir {
        path: PathBuf,
        /// Create missing parents
        #[arg(short, long)]
        parents: bool,
        #[arg(long, value_parser = parse_mode, default_value = "755")]
        mode: u32,
    },

    /// Change permission bits (octal)
    Chmod {
        #[arg(value_parser = parse_mode)]
        mode: u32,
        path: PathBuf,
    },

    /// Set access and modification times to now, creating the file if missing
    Touch { path: PathBuf },
}

fn parse_mode(s: &str) -> std::result::Result<u32, String> {
    let digits = s.strip_prefix("0o").unwrap_or(s);
    match u32::from_str_radix(digits, 8) {
        Ok(mode) if mode <= 0o7777 => Ok(mode),
        Ok(_) => Err(format!("mode out of range: {s}")),
        Err(_) => Err(format!("not an octal mode: {s}")),
    }
}

/// Execute `command`, writing its output to `out`.
///
/// `stdin` holds the contents for `write` when `--data` was not given.
pub async fn run(
    fs: &CopyOnWriteFs,
    command: Command,
    stdin: Option<Vec<u8>>,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::Stat { path } => {
            let meta = fs
                .stat(&path)
                .await
                .with_context(|| format!("stat {}", path.display()))?;
            let layer = match fs.classify(&path).await? {
                Presence::OverlayPresent => "overlay",
                Presence::BaseOnly => "base",
            };
            let kind = if meta.is_dir() { "directory" } else { "file" };
            writeln!(out, "{kind} {} {:04o} {layer}", meta.size, meta.mode)?;
        }
        Command::Cat { path } => {
            let content = fs
                .read_file(&path)
                .await
                .with_context(|| format!("cat {}", path.display()))?;
            out.write_all(&content)?;
        }
        Command::Write {
            path,
            data,
            append,
            mode,
        } => {
            let content = match data {
                Some(data) => data.into_bytes(),
                None => stdin.unwrap_or_default(),
            };
            ensure_overlay_parent(fs, &path).await?;
            let options = OpenOptions::new()
                .write(true)
                .create(true)
                .append(append)
                .truncate(!append);
            let mut file = fs
                .open_file(&path, options, mode)
                .await
                .with_context(|| format!("open {}", path.display()))?;
            file.write_all(&content).await?;
            file.close().await?;
        }
        Command::Ls { path } => {
            let mut dir = fs
                .open(&path)
                .await
                .with_context(|| format!("ls {}", path.display()))?;
            let entries = dir.read_dir().await?;
            dir.close().await?;
            for entry in entries {
                let kind = if entry.metadata.is_dir() { 'd' } else { '-' };
                writeln!(
                    out,
                    "{kind} {:04o} {:>8} {}",
                    entry.metadata.mode, entry.metadata.size, entry.name
                )?;
            }
        }
        Command::Rm { path, recursive } => {
            let removed = if recursive {
                fs.remove_all(&path).await
            } else {
                fs.remove(&path).await
            };
            removed.with_context(|| format!("rm {}", path.display()))?;
        }
        Command::Mv { from, to } => {
            fs.rename(&from, &to)
                .await
                .with_context(|| format!("mv {} {}", from.display(), to.display()))?;
        }
        Command::Mkdir {
            path,
            parents,
            mode,
        } => {
            let made = if parents {
                fs.mkdir_all(&path, mode).await
            } else {
                fs.mkdir(&path, mode).await
            };
            made.with_context(|| format!("mkdir {}", path.display()))?;
        }
        Command::Chmod { mode, path } => {
            fs.chmod(&path, mode)
                .await
                .with_context(|| format!("chmod {}", path.display()))?;
        }
        Command::Touch { path } => {
            let touched = if fs.exists(&path).await? {
                let now = SystemTime::now();
                fs.set_times(&path, now, now).await
            } else {
                ensure_overlay_parent(fs, &path).await?;
                match fs.create(&path).await {
                    Ok(mut file) => file.close().await,
                    Err(e) => Err(e),
                }
            };
            touched.with_context(|| format!("touch {}", path.display()))?;
        }
    }
    Ok(())
}

/// New files need their directory in the overlay; copy it up when only the
/// base has it.
async fn ensure_overlay_parent(fs: &CopyOnWriteFs, path: &Path) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    match fs.classify(parent).await {
        Ok(Presence::BaseOnly) => {
            if !fs.stat(parent).await?.is_dir() {
                bail!("not a directory: {}", parent.display());
            }
            tracing::debug!(parent = %parent.display(), "copying parent directory to overlay");
            copy_to_layer(fs.base().as_ref(), fs.layer().as_ref(), parent)
                .await
                .with_context(|| format!("copy up {}", parent.display()))?;
        }
        Ok(Presence::OverlayPresent) => {}
        Err(e) if e.is_not_found() => bail!("no such directory: {}", parent.display()),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cowfs::{RealFs, ReadOnlyFs};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Dirs {
        base: TempDir,
        overlay: TempDir,
        fs: CopyOnWriteFs,
    }

    fn dirs() -> Dirs {
        let base = TempDir::new().unwrap();
        let overlay = TempDir::new().unwrap();
        let fs = CopyOnWriteFs::new(
            Arc::new(ReadOnlyFs::new(Arc::new(RealFs::new(base.path())))),
            Arc::new(RealFs::new(overlay.path())),
        );
        Dirs { base, overlay, fs }
    }

    async fn exec(fs: &CopyOnWriteFs, command: Command) -> Result<String> {
        let mut out = Vec::new();
        run(fs, command, None, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn parses_octal_modes() {
        assert_eq!(parse_mode("644"), Ok(0o644));
        assert_eq!(parse_mode("0o755"), Ok(0o755));
        assert!(parse_mode("9").is_err());
        assert!(parse_mode("77777").is_err());
    }

    #[tokio::test]
    async fn write_into_base_directory_lands_in_overlay() {
        let d = dirs();
        std::fs::create_dir(d.base.path().join("etc")).unwrap();
        std::fs::write(d.base.path().join("etc/motd"), "hello").unwrap();

        exec(
            &d.fs,
            Command::Write {
                path: "/etc/motd".into(),
                data: Some("world".into()),
                append: false,
                mode: 0o644,
            },
        )
        .await
        .unwrap();

        assert_eq!(std::fs::read_to_string(d.overlay.path().join("etc/motd")).unwrap(), "world");
        assert_eq!(std::fs::read_to_string(d.base.path().join("etc/motd")).unwrap(), "hello");
        let shown = exec(&d.fs, Command::Cat { path: "/etc/motd".into() }).await.unwrap();
        assert_eq!(shown, "world");
    }

    #[tokio::test]
    async fn new_file_under_base_directory_gets_parent_copied() {
        let d = dirs();
        std::fs::create_dir(d.base.path().join("conf")).unwrap();

        exec(
            &d.fs,
            Command::Write {
                path: "/conf/new.toml".into(),
                data: None,
                append: false,
                mode: 0o600,
            },
        )
        .await
        .unwrap();

        assert!(d.overlay.path().join("conf/new.toml").is_file());
        assert!(!d.base.path().join("conf/new.toml").exists());
    }

    #[tokio::test]
    async fn ls_merges_both_layers() {
        let d = dirs();
        std::fs::write(d.base.path().join("from-base"), "b").unwrap();
        std::fs::write(d.overlay.path().join("from-overlay"), "o").unwrap();

        let listing = exec(&d.fs, Command::Ls { path: "/".into() }).await.unwrap();
        let names: Vec<&str> = listing
            .lines()
            .filter_map(|line| line.split_whitespace().last())
            .collect();
        assert_eq!(names, vec!["from-base", "from-overlay"]);
    }

    #[tokio::test]
    async fn stat_reports_owning_layer() {
        let d = dirs();
        std::fs::write(d.base.path().join("f"), "abc").unwrap();

        let before = exec(&d.fs, Command::Stat { path: "/f".into() }).await.unwrap();
        assert!(before.starts_with("file 3 "));
        assert!(before.trim_end().ends_with("base"));

        exec(&d.fs, Command::Chmod { mode: 0o600, path: "/f".into() })
            .await
            .unwrap();
        let after = exec(&d.fs, Command::Stat { path: "/f".into() }).await.unwrap();
        assert_eq!(after.trim_end(), "file 3 0600 overlay");
    }

    #[tokio::test]
    async fn rm_of_base_only_file_fails() {
        let d = dirs();
        std::fs::write(d.base.path().join("keep"), "x").unwrap();

        let err = exec(
            &d.fs,
            Command::Rm {
                path: "/keep".into(),
                recursive: false,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<cowfs::Error>(),
            Some(cowfs::Error::PermissionDenied)
        ));
        assert!(d.base.path().join("keep").exists());
    }

    #[tokio::test]
    async fn touch_creates_missing_file_in_overlay() {
        let d = dirs();
        exec(&d.fs, Command::Touch { path: "/fresh".into() }).await.unwrap();
        assert!(d.overlay.path().join("fresh").is_file());
        assert!(!d.base.path().join("fresh").exists());
    }
}
