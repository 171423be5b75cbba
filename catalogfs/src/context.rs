//! The process-wide mount context: the source directory handle and the
//! mount's policy flags, created once at mount time and passed explicitly
//! into every dispatcher call rather than reached for as an ambient global.

use std::io;
use std::os::fd::{FromRawFd, OwnedFd};
use std::path::{Path, PathBuf};

use catalogfs_sidecar::converters::OverlayFlags;
use nix::fcntl::{open, OFlag};
use nix::sys::stat::Mode;

/// Owns the source-directory handle and the overlay policy for one mount.
pub struct MountContext {
    pub source: PathBuf,
    pub dir_fd: OwnedFd,
    pub overlay: OverlayFlags,
    pub log_errors_only: bool,
}

impl MountContext {
    pub fn open(source: &Path, overlay: OverlayFlags, log_errors_only: bool) -> io::Result<Self> {
        let raw_fd = open(source, OFlag::O_DIRECTORY | OFlag::O_RDONLY, Mode::empty())
            .map_err(io::Error::from)?;
        // SAFETY: `open` just handed us a freshly opened, uniquely owned fd.
        let dir_fd = unsafe { OwnedFd::from_raw_fd(raw_fd) };
        Ok(Self {
            source: source.to_path_buf(),
            dir_fd,
            overlay,
            log_errors_only,
        })
    }
}
