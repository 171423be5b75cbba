//! The filesystem operation dispatcher: the `fuser::Filesystem` callbacks
//! that mediate between the kernel and the underlying source directory.
//!
//! Every operation resolves its path via the inode table, then works
//! against the source directory handle using directory-relative syscalls
//! (`openat`, `fstatat`, `mkdirat`, ...) through `nix`. The symlink-follow
//! policy is "never follow" for every stat-like operation.

use std::ffi::OsStr;
use std::fs::File;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use fuser::{
    FileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request, TimeOrNow,
};
use nix::fcntl::{openat, AtFlags, OFlag};
use nix::sys::stat::{fstatat, mkdirat, utimensat, Mode, UtimensatFlags};
use nix::sys::time::TimeSpec;
use nix::unistd::{linkat, readlinkat, renameat, symlinkat, unlinkat, LinkatFlags, UnlinkatFlags};

use catalogfs_errno::CatalogErrno;
use catalogfs_sidecar::converters::{
    apply_overlay, blocks_from_size, platform_attr_to_record, PlatformAttr,
};
use catalogfs_sidecar::format::read_sidecar;
use catalogfs_sidecar::write::write_sidecar_to_file;
use catalogfs_sidecar::Metadata;

use crate::attr::{to_file_attr, TTL};
use crate::context::MountContext;
use crate::handle::HandleTable;
use crate::inode::{InodeTable, ROOT_INO};
use crate::relpath;

pub struct CatalogFs {
    ctx: MountContext,
    inodes: InodeTable,
    handles: HandleTable,
}

impl CatalogFs {
    pub fn new(ctx: MountContext) -> Self {
        Self {
            ctx,
            inodes: InodeTable::new(),
            handles: HandleTable::new(),
        }
    }

    fn dir_fd(&self) -> i32 {
        self.ctx.dir_fd.as_raw_fd()
    }

    fn path_for(&self, ino: u64) -> Option<PathBuf> {
        self.inodes.path_of(ino)
    }

    fn stat_no_follow(&self, relpath: &Path) -> Result<PlatformAttr, CatalogErrno> {
        let st = fstatat(Some(self.dir_fd()), relpath, AtFlags::AT_SYMLINK_NOFOLLOW)?;
        Ok(PlatformAttr::from(st))
    }

    /// The getattr overlay contract: accept only regular/dir/symlink; a
    /// zero-size regular file is "newly created, not yet released" and is
    /// reported unchanged; otherwise overlay the sidecar onto the stat.
    fn resolve_attr(&self, relpath: &Path) -> Result<PlatformAttr, CatalogErrno> {
        let base = self.stat_no_follow(relpath)?;
        let type_bits = base.mode & libc::S_IFMT;
        if type_bits != libc::S_IFREG && type_bits != libc::S_IFDIR && type_bits != libc::S_IFLNK {
            return Err(CatalogErrno::Perm);
        }
        if type_bits != libc::S_IFREG || base.size == 0 {
            return Ok(base);
        }

        let skeleton = platform_attr_to_record(&base);
        let raw_fd = openat(Some(self.dir_fd()), relpath, OFlag::O_RDONLY, Mode::empty())?;
        let mut file = unsafe { File::from_raw_fd(raw_fd) };
        let record = read_sidecar(&mut file, skeleton).map_err(CatalogErrno::from)?;
        Ok(apply_overlay(&record, base, self.ctx.overlay))
    }

    fn entry_reply(&self, relpath: &Path, reply: ReplyEntry) -> i32 {
        match self.resolve_attr(relpath) {
            Ok(attr) => {
                let ino = self.inodes.intern(relpath.to_path_buf());
                reply.entry(&TTL, &to_file_attr(ino, &attr), 0);
                0
            }
            Err(e) => {
                reply.error(e.code());
                -e.code()
            }
        }
    }

    /// Serialize the sidecar at `relpath` through `fd`: seed a skeleton
    /// from the underlying inode, overwrite size/blocks from `accumulator`,
    /// write it back.
    fn serialize(&self, fd: i32, relpath: &Path, accumulator: i64) -> Result<(), CatalogErrno> {
        let st = fstatat(Some(self.dir_fd()), relpath, AtFlags::AT_SYMLINK_NOFOLLOW)?;
        let base = PlatformAttr::from(st);
        let mut record: Metadata = platform_attr_to_record(&base);
        record.size = accumulator;
        record.blocks = blocks_from_size(accumulator);
        // SAFETY: `fd` is a valid, open descriptor for the duration of this
        // call; the File wrapper is never allowed to close it (see below).
        let mut file = unsafe { File::from_raw_fd(fd) };
        let result = write_sidecar_to_file(&mut file, &record).map_err(CatalogErrno::from);
        // Caller owns `fd`'s lifetime; don't let File's Drop close it unless
        // explicitly intended (handled by call sites via into_raw_fd dance).
        std::mem::forget(file);
        result
    }

    fn log(&self, op: &str, relpath: &Path, code: i32) {
        let line = crate::logger::call_result(op, relpath, code);
        if code == 0 {
            log::info!("{line}");
        } else {
            log::error!("{line}");
        }
    }
}

/// Map a `setattr` time argument onto the `utimensat(2)` sentinel the kernel
/// expects: no value leaves the underlying timestamp untouched, `Now` asks
/// the kernel to stamp its own clock, and a specific time is passed through
/// verbatim.
fn timespec_for(time: Option<TimeOrNow>) -> TimeSpec {
    match time {
        None => TimeSpec::new(0, libc::UTIME_OMIT as i64),
        Some(TimeOrNow::Now) => TimeSpec::new(0, libc::UTIME_NOW as i64),
        Some(TimeOrNow::SpecificTime(t)) => {
            let dur = t
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default();
            TimeSpec::new(dur.as_secs() as i64, dur.subsec_nanos() as i64)
        }
    }
}

impl Filesystem for CatalogFs {
    fn init(&mut self, _req: &Request<'_>, config: &mut KernelConfig) -> Result<(), i32> {
        // Disable all caching: entry/attribute/negative timeouts are zero
        // (see `attr::TTL`), so hard-link counts and other multi-reference
        // attributes stay consistent as links appear or vanish beneath us.
        let _ = config.set_max_readahead(0);
        Ok(())
    }

    fn destroy(&mut self) {}

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(parent_path) = self.path_for(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let relpath = relpath::child_path(&parent_path, name);
        let code = self.entry_reply(&relpath, reply);
        self.log("lookup", &relpath, code);
    }

    fn forget(&mut self, _req: &Request<'_>, _ino: u64, _nlookup: u64) {}

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let Some(relpath) = self.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let code = match self.resolve_attr(&relpath) {
            Ok(attr) => {
                reply.attr(&TTL, &to_file_attr(ino, &attr));
                0
            }
            Err(e) => {
                reply.error(e.code());
                -e.code()
            }
        };
        self.log("getattr", &relpath, code);
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        _size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        // chmod/chown/utimens are archival-immutable: they affect only the
        // sidecar's own directory-entry attributes, never its contents.
        // The underlying inode already carries whatever the syscall below
        // changed; we simply re-read and reply with the overlay.
        let Some(relpath) = self.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };

        let result = (|| -> Result<(), CatalogErrno> {
            if let Some(mode) = mode {
                nix::sys::stat::fchmodat(
                    Some(self.dir_fd()),
                    &relpath,
                    Mode::from_bits_truncate(mode),
                    nix::sys::stat::FchmodatFlags::NoFollowSymlink,
                )?;
            }
            if uid.is_some() || gid.is_some() {
                nix::unistd::fchownat(
                    Some(self.dir_fd()),
                    &relpath,
                    uid.map(nix::unistd::Uid::from_raw),
                    gid.map(nix::unistd::Gid::from_raw),
                    AtFlags::AT_SYMLINK_NOFOLLOW,
                )?;
            }
            // don't use utime/utimes since they follow symlinks
            if atime.is_some() || mtime.is_some() {
                utimensat(
                    Some(self.dir_fd()),
                    &relpath,
                    &timespec_for(atime),
                    &timespec_for(mtime),
                    UtimensatFlags::NoFollowSymlink,
                )?;
            }
            Ok(())
        })();

        let code = match result.and_then(|()| self.resolve_attr(&relpath)) {
            Ok(attr) => {
                reply.attr(&TTL, &to_file_attr(ino, &attr));
                0
            }
            Err(e) => {
                reply.error(e.code());
                -e.code()
            }
        };
        self.log("setattr", &relpath, code);
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        let Some(relpath) = self.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let code = match readlinkat(Some(self.dir_fd()), &relpath) {
            Ok(target) => {
                reply.data(target.as_os_str().as_encoded_bytes());
                0
            }
            Err(e) => {
                let errno = CatalogErrno::from(e);
                reply.error(errno.code());
                -errno.code()
            }
        };
        self.log("readlink", &relpath, code);
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let Some(parent_path) = self.path_for(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let relpath = relpath::child_path(&parent_path, name);
        // umask is forced to 0 at process start, so `mode` reaches mkdirat
        // unmasked: this mirrors the source's intent to faithfully reflect
        // the requested mode.
        let code = match mkdirat(Some(self.dir_fd()), &relpath, Mode::from_bits_truncate(mode)) {
            Ok(()) => self.entry_reply(&relpath, reply),
            Err(e) => {
                let errno = CatalogErrno::from(e);
                reply.error(errno.code());
                -errno.code()
            }
        };
        self.log("mkdir", &relpath, code);
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(parent_path) = self.path_for(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let relpath = relpath::child_path(&parent_path, name);
        let code = match unlinkat(Some(self.dir_fd()), &relpath, UnlinkatFlags::NoRemoveDir) {
            Ok(()) => {
                self.inodes.forget_path(&relpath);
                reply.ok();
                0
            }
            Err(e) => {
                let errno = CatalogErrno::from(e);
                reply.error(errno.code());
                -errno.code()
            }
        };
        self.log("unlink", &relpath, code);
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(parent_path) = self.path_for(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let relpath = relpath::child_path(&parent_path, name);
        let code = match unlinkat(Some(self.dir_fd()), &relpath, UnlinkatFlags::RemoveDir) {
            Ok(()) => {
                self.inodes.forget_path(&relpath);
                reply.ok();
                0
            }
            Err(e) => {
                let errno = CatalogErrno::from(e);
                reply.error(errno.code());
                -errno.code()
            }
        };
        self.log("rmdir", &relpath, code);
    }

    fn symlink(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        link_name: &OsStr,
        target: &Path,
        reply: ReplyEntry,
    ) {
        let Some(parent_path) = self.path_for(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let relpath = relpath::child_path(&parent_path, link_name);
        // Symlinks are stored verbatim and need no sidecar: they have no
        // content to describe.
        let code = match symlinkat(target, Some(self.dir_fd()), &relpath) {
            Ok(()) => self.entry_reply(&relpath, reply),
            Err(e) => {
                let errno = CatalogErrno::from(e);
                reply.error(errno.code());
                -errno.code()
            }
        };
        self.log("symlink", &relpath, code);
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        flags: u32,
        reply: ReplyEmpty,
    ) {
        if flags != 0 {
            reply.error(libc::EINVAL);
            self.log("rename", Path::new(""), -libc::EINVAL);
            return;
        }
        let (Some(parent_path), Some(newparent_path)) =
            (self.path_for(parent), self.path_for(newparent))
        else {
            reply.error(libc::ENOENT);
            return;
        };
        let from = relpath::child_path(&parent_path, name);
        let to = relpath::child_path(&newparent_path, newname);
        // The sidecar's own metadata is never rewritten here: rename moves
        // only the directory entry, preserving archival provenance.
        let code = match renameat(
            Some(self.dir_fd()),
            &from,
            Some(self.dir_fd()),
            &to,
        ) {
            Ok(()) => {
                self.inodes.rename(&from, &to);
                reply.ok();
                0
            }
            Err(e) => {
                let errno = CatalogErrno::from(e);
                reply.error(errno.code());
                -errno.code()
            }
        };
        self.log("rename", &from, code);
    }

    fn link(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        let (Some(existing), Some(newparent_path)) =
            (self.path_for(ino), self.path_for(newparent))
        else {
            reply.error(libc::ENOENT);
            return;
        };
        let new_relpath = relpath::child_path(&newparent_path, newname);
        let code = match linkat(
            Some(self.dir_fd()),
            &existing,
            Some(self.dir_fd()),
            &new_relpath,
            LinkatFlags::NoSymlinkFollow,
        ) {
            Ok(()) => self.entry_reply(&new_relpath, reply),
            Err(e) => {
                let errno = CatalogErrno::from(e);
                reply.error(errno.code());
                -errno.code()
            }
        };
        self.log("link", &new_relpath, code);
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        // Opening an existing sidecar is always rejected: sidecars carry no
        // readable content, and the only way to populate one is create()
        // followed by write()s.
        let relpath = self.path_for(ino).unwrap_or_default();
        reply.error(libc::EACCES);
        self.log("open", &relpath, -libc::EACCES);
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        _offset: i64,
        _size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let relpath = self.path_for(ino).unwrap_or_default();
        reply.error(libc::EPERM);
        self.log("read", &relpath, -libc::EPERM);
    }

    #[allow(clippy::too_many_arguments)]
    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let relpath = self.path_for(ino).unwrap_or_default();
        // Allow writing only to previously opened or created regular files.
        match self.stat_no_follow(&relpath) {
            Ok(attr) if attr.mode & libc::S_IFMT == libc::S_IFREG => {}
            _ => {
                reply.error(libc::EPERM);
                self.log("write", &relpath, -libc::EPERM);
                return;
            }
        }
        // Bytes offered by writers are counted but never kept.
        let updated = self
            .handles
            .with_handle(fh, |h| h.record_write(offset, data.len() as i64));
        let code = if updated.is_some() {
            reply.written(data.len() as u32);
            0
        } else {
            reply.error(libc::EINVAL);
            -libc::EINVAL
        };
        self.log("write", &relpath, code);
    }

    fn flush(&mut self, _req: &Request<'_>, ino: u64, fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        let relpath = self.path_for(ino).unwrap_or_default();
        let outcome = self.handles.with_handle(fh, |h| {
            // Duplicate the descriptor so closing it here never touches
            // the handle's own fd, which stays live until release().
            let dup_fd = nix::unistd::dup(h.fd.as_raw_fd())?;
            let result = self.serialize(dup_fd, &relpath, h.accumulator);
            let _ = nix::unistd::close(dup_fd);
            result
        });
        let code = match outcome {
            None => {
                reply.error(libc::EINVAL);
                -libc::EINVAL
            }
            Some(Ok(())) => {
                reply.ok();
                0
            }
            Some(Err(e)) => {
                reply.error(e.code());
                -e.code()
            }
        };
        self.log("flush", &relpath, code);
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        let relpath = self.path_for(ino).unwrap_or_default();
        // Errors here are logged but never propagated: release is
        // fire-and-forget per the runtime contract (its return value is
        // ignored by the kernel regardless).
        if let Some(handle) = self.handles.remove(fh) {
            let raw_fd = handle.fd.into_raw_fd();
            let result = self.serialize(raw_fd, &relpath, handle.accumulator);
            unsafe { libc::close(raw_fd) };
            if let Err(e) = result {
                self.log("release", &relpath, -e.code());
            } else {
                self.log("release", &relpath, 0);
            }
        }
        reply.ok();
    }

    fn opendir(&mut self, _req: &Request<'_>, _ino: u64, _flags: i32, reply: ReplyOpen) {
        reply.opened(0, 0);
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(relpath) = self.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };

        let code = (|| -> Result<(), CatalogErrno> {
            let full = self.ctx.source.join(&relpath);
            let parent_relpath = relpath
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| relpath.clone());

            let mut entries: Vec<(PathBuf, std::ffi::OsString, FileType)> = vec![
                (relpath.clone(), std::ffi::OsString::from("."), FileType::Directory),
                (parent_relpath, std::ffi::OsString::from(".."), FileType::Directory),
            ];

            for entry in std::fs::read_dir(&full)? {
                let entry = entry?;
                let child_relpath = relpath::child_path(&relpath, &entry.file_name());
                let st = self.stat_no_follow(&child_relpath)?;
                let kind = crate::attr::mode_to_kind(st.mode);
                entries.push((child_relpath, entry.file_name(), kind));
            }

            for (i, (child_relpath, name, kind)) in
                entries.into_iter().enumerate().skip(offset as usize)
            {
                let ino = self.inodes.intern(child_relpath);
                if reply.add(ino, (i + 1) as i64, kind, name) {
                    break;
                }
            }
            Ok(())
        })();

        let code = match code {
            Ok(()) => {
                reply.ok();
                0
            }
            Err(e) => {
                reply.error(e.code());
                -e.code()
            }
        };
        self.log("readdir", &relpath, code);
    }

    fn releasedir(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        let code = match nix::sys::statvfs::fstatvfs(&self.ctx.dir_fd) {
            Ok(stats) => {
                reply.statfs(
                    stats.blocks(),
                    stats.blocks_free(),
                    stats.blocks_available(),
                    stats.files(),
                    stats.files_free(),
                    stats.block_size() as u32,
                    stats.name_max() as u32,
                    stats.fragment_size() as u32,
                );
                0
            }
            Err(e) => {
                let errno = CatalogErrno::from(e);
                reply.error(errno.code());
                -errno.code()
            }
        };
        self.log("statfs", Path::new("."), code);
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        let Some(parent_path) = self.path_for(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let relpath = relpath::child_path(&parent_path, name);

        if mode & libc::S_IFMT != 0 && mode & libc::S_IFMT != libc::S_IFREG {
            reply.error(libc::EPERM);
            self.log("create", &relpath, -libc::EPERM);
            return;
        }

        let oflags = OFlag::from_bits_truncate(flags) | OFlag::O_CREAT;
        let code = match openat(
            Some(self.dir_fd()),
            &relpath,
            oflags,
            Mode::from_bits_truncate(mode),
        ) {
            Ok(raw_fd) => {
                let fd = unsafe { std::os::fd::OwnedFd::from_raw_fd(raw_fd) };
                let fh = self.handles.insert(fd);
                match self.resolve_attr(&relpath) {
                    Ok(attr) => {
                        let ino = self.inodes.intern(relpath.clone());
                        reply.created(&TTL, &to_file_attr(ino, &attr), 0, fh, 0);
                        0
                    }
                    Err(e) => {
                        reply.error(e.code());
                        -e.code()
                    }
                }
            }
            Err(e) => {
                let errno = CatalogErrno::from(e);
                reply.error(errno.code());
                -errno.code()
            }
        };
        self.log("create", &relpath, code);
    }
}
