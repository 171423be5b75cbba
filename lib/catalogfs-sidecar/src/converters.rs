//! Bidirectional fill routines between a [`Metadata`] record and the
//! platform's `stat`-shaped attribute block, with per-field overlay masking.

use crate::Metadata;

/// A POSIX `stat`-shaped attribute block, mirroring exactly the fields
/// `Metadata` carries. Kept separate from `libc::stat`/`nix::FileStat` so
/// overlay application can freely construct and overwrite fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformAttr {
    pub size: i64,
    pub blocks: i64,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub atime: i64,
    pub atime_nsec: i64,
    pub mtime: i64,
    pub mtime_nsec: i64,
    pub ctime: i64,
    pub ctime_nsec: i64,
    pub nlink: u64,
    pub blksize: i64,
}

impl From<nix::sys::stat::FileStat> for PlatformAttr {
    fn from(st: nix::sys::stat::FileStat) -> Self {
        Self {
            size: st.st_size,
            blocks: st.st_blocks,
            mode: st.st_mode,
            uid: st.st_uid,
            gid: st.st_gid,
            atime: st.st_atime,
            atime_nsec: st.st_atime_nsec,
            mtime: st.st_mtime,
            mtime_nsec: st.st_mtime_nsec,
            ctime: st.st_ctime,
            ctime_nsec: st.st_ctime_nsec,
            nlink: st.st_nlink as u64,
            blksize: st.st_blksize as i64,
        }
    }
}

/// Which overlaid fields should replace the underlying inode's values.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlayFlags {
    pub mode: bool,
    pub times: bool,
    pub uid: bool,
    pub gid: bool,
}

/// Conversion 1: copy a platform attribute block straight into a record.
pub fn platform_attr_to_record(attr: &PlatformAttr) -> Metadata {
    Metadata {
        size: attr.size,
        blocks: attr.blocks,
        mode: attr.mode,
        uid: attr.uid,
        gid: attr.gid,
        atime: attr.atime,
        mtime: attr.mtime,
        ctime: attr.ctime,
        atimensec: attr.atime_nsec,
        mtimensec: attr.mtime_nsec,
        ctimensec: attr.ctime_nsec,
        nlink: attr.nlink,
        blksize: attr.blksize,
    }
}

/// Conversion 2: overlay a record's fields onto a base platform attribute
/// block, respecting which fields the mount's policy flags say should
/// override the underlying inode.
///
/// `size` and `blocks` always come from the record. `nlink` and `blksize`
/// are never overwritten — the underlying inode's values stay truthful.
pub fn apply_overlay(record: &Metadata, base: PlatformAttr, flags: OverlayFlags) -> PlatformAttr {
    let mut out = base;
    out.size = record.size;
    out.blocks = record.blocks;
    if flags.mode {
        out.mode = record.mode;
    }
    if flags.times {
        out.atime = record.atime;
        out.atime_nsec = record.atimensec;
        out.mtime = record.mtime;
        out.mtime_nsec = record.mtimensec;
        out.ctime = record.ctime;
        out.ctime_nsec = record.ctimensec;
    }
    if flags.uid {
        out.uid = record.uid;
    }
    if flags.gid {
        out.gid = record.gid;
    }
    out
}

/// `blocks = size/512 + 1`, always. Over-reports by one for exact
/// multiples of 512 and for a zero size; preserved intentionally for
/// behavioral parity with the original implementation.
pub fn blocks_from_size(size: i64) -> i64 {
    size / 512 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_from_size_always_adds_one() {
        assert_eq!(blocks_from_size(0), 1);
        assert_eq!(blocks_from_size(512), 2);
        assert_eq!(blocks_from_size(1010), 2);
        assert_eq!(blocks_from_size(1024), 3);
    }

    #[test]
    fn overlay_always_takes_size_and_blocks_from_record() {
        let record = Metadata {
            size: 100,
            blocks: 1,
            mode: 0o100644,
            ..Metadata::default()
        };
        let base = PlatformAttr {
            size: 0,
            blocks: 0,
            mode: 0o100600,
            uid: 42,
            ..PlatformAttr::default()
        };
        let out = apply_overlay(&record, base, OverlayFlags::default());
        assert_eq!(out.size, 100);
        assert_eq!(out.blocks, 1);
        // mode/uid untouched since their flags are off.
        assert_eq!(out.mode, 0o100600);
        assert_eq!(out.uid, 42);
    }

    #[test]
    fn overlay_respects_individual_flags() {
        let record = Metadata {
            size: 1,
            mode: 0o100755,
            uid: 1,
            gid: 2,
            atime: 10,
            mtime: 20,
            ctime: 30,
            ..Metadata::default()
        };
        let base = PlatformAttr::default();
        let flags = OverlayFlags {
            mode: true,
            uid: true,
            gid: false,
            times: true,
        };
        let out = apply_overlay(&record, base, flags);
        assert_eq!(out.mode, 0o100755);
        assert_eq!(out.uid, 1);
        assert_eq!(out.gid, 0);
        assert_eq!(out.atime, 10);
    }

    #[test]
    fn nlink_and_blksize_are_never_overwritten() {
        let record = Metadata {
            nlink: 99,
            blksize: 65536,
            ..Metadata::default()
        };
        let base = PlatformAttr {
            nlink: 1,
            blksize: 4096,
            ..PlatformAttr::default()
        };
        let flags = OverlayFlags {
            mode: true,
            times: true,
            uid: true,
            gid: true,
        };
        let out = apply_overlay(&record, base, flags);
        assert_eq!(out.nlink, 1);
        assert_eq!(out.blksize, 4096);
    }
}
