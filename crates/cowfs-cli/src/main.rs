//! cowfs CLI - Command line interface for the copy-on-write layered filesystem
//!
//! Usage:
//!   cowfs --base ./image --overlay ./changes ls /etc
//!   cowfs --base ./image --overlay ./changes write /etc/motd --data 'hi'
//!   echo hi | cowfs --base ./image --overlay ./changes write /etc/motd
//!   COWFS_BASE=./image COWFS_OVERLAY=./changes cowfs stat /etc/motd

mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use cowfs::{CopyOnWriteFs, RealFs, ReadOnlyFs};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

use commands::Command;

/// cowfs - Copy-on-write union of a read-only base and a writable overlay
#[derive(Parser, Debug)]
#[command(name = "cowfs")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base directory (never modified)
    #[arg(long, env = "COWFS_BASE")]
    base: PathBuf,

    /// Overlay directory (receives every change)
    #[arg(long, env = "COWFS_OVERLAY")]
    overlay: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "cowfs=debug",
        _ => "cowfs=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    for (label, dir) in [("base", &args.base), ("overlay", &args.overlay)] {
        let meta = std::fs::metadata(dir)
            .with_context(|| format!("Failed to open {label} directory: {}", dir.display()))?;
        anyhow::ensure!(meta.is_dir(), "{label} is not a directory: {}", dir.display());
    }

    let base = Arc::new(ReadOnlyFs::new(Arc::new(RealFs::new(&args.base))));
    let overlay = Arc::new(RealFs::new(&args.overlay));
    let fs = CopyOnWriteFs::new(base, overlay);
    tracing::debug!(base = %args.base.display(), overlay = %args.overlay.display(), "layers ready");

    // Data for `write` comes from stdin unless given inline
    let stdin = match &args.command {
        Command::Write { data: None, .. } => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .context("Failed to read stdin")?;
            Some(buf)
        }
        _ => None,
    };

    let mut out = std::io::stdout().lock();
    commands::run(&fs, args.command, stdin, &mut out).await
}
