//! Conversion from the sidecar crate's platform-neutral [`PlatformAttr`]
//! into the `fuser`-specific [`FileAttr`] the kernel actually wants.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use catalogfs_sidecar::converters::PlatformAttr;
use fuser::{FileAttr, FileType};

/// The init callback disables all caching, so every lookup/attr reply uses
/// a zero TTL: hard-link counts and other multi-reference attributes stay
/// consistent as links appear or vanish beneath the overlay.
pub const TTL: Duration = Duration::from_secs(0);

pub fn mode_to_kind(mode: u32) -> FileType {
    match mode & libc::S_IFMT {
        libc::S_IFDIR => FileType::Directory,
        libc::S_IFLNK => FileType::Symlink,
        _ => FileType::RegularFile,
    }
}

fn system_time(sec: i64, nsec: i64) -> SystemTime {
    if sec >= 0 {
        UNIX_EPOCH + Duration::new(sec as u64, nsec.clamp(0, 999_999_999) as u32)
    } else {
        UNIX_EPOCH - Duration::new(sec.unsigned_abs(), 0)
    }
}

pub fn to_file_attr(ino: u64, attr: &PlatformAttr) -> FileAttr {
    let kind = mode_to_kind(attr.mode);
    let perm = (attr.mode & 0o7777) as u16;
    // Linux has no creation-time concept; ctime is the closest analogue and
    // is what most passthrough FUSE filesystems report for it.
    let ctime = system_time(attr.ctime, attr.ctime_nsec);
    FileAttr {
        ino,
        size: attr.size.max(0) as u64,
        blocks: attr.blocks.max(0) as u64,
        atime: system_time(attr.atime, attr.atime_nsec),
        mtime: system_time(attr.mtime, attr.mtime_nsec),
        ctime,
        crtime: ctime,
        kind,
        perm,
        nlink: attr.nlink as u32,
        uid: attr.uid,
        gid: attr.gid,
        rdev: 0,
        blksize: attr.blksize.max(0) as u32,
        flags: 0,
    }
}
