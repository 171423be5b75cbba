//! Command-line parsing. Out of scope for the core design, but a complete
//! binary still needs it; grounded on `clap`'s derive style.

use std::path::PathBuf;

use clap::Parser;

/// Present a catalog of sidecar files as the originals they describe.
#[derive(Parser, Debug)]
#[command(name = "catalogfs", author, version, about)]
pub struct CliArgs {
    /// Where to expose the overlay.
    pub mountpoint: PathBuf,

    /// The directory holding sidecars. Defaults to the mountpoint itself
    /// (mount-in-place).
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Do not overlay the sidecar's saved mode onto getattr results.
    #[arg(long)]
    pub ignore_saved_mode: bool,

    /// Do not overlay the sidecar's saved access/modify/change times.
    #[arg(long)]
    pub ignore_saved_times: bool,

    /// Overlay the sidecar's saved uid onto getattr results.
    #[arg(long)]
    pub use_saved_uid: bool,

    /// Overlay the sidecar's saved gid onto getattr results.
    #[arg(long)]
    pub use_saved_gid: bool,

    /// Log every dispatcher call to this file.
    #[arg(long)]
    pub log: Option<PathBuf>,

    /// Only log failed calls.
    #[arg(long)]
    pub log_errors_only: bool,

    /// Stay in the foreground instead of daemonizing.
    #[arg(short, long)]
    pub foreground: bool,

    /// Allow other users to access the mount.
    #[arg(long)]
    pub allow_other: bool,

    /// Allow the root user to access the mount.
    #[arg(long)]
    pub allow_root: bool,

    /// Unmount automatically when the process exits.
    #[arg(long)]
    pub auto_unmount: bool,
}

impl CliArgs {
    pub fn source_dir(&self) -> PathBuf {
        self.source.clone().unwrap_or_else(|| self.mountpoint.clone())
    }
}
