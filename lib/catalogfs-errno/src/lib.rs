//! Crate-wide error codes for CatalogFS, numbered to match Linux `errno.h`.
//!
//! Every syscall-facing layer (the sidecar codec, the metadata converters,
//! the filesystem dispatcher) returns `CatalogErrno` so the dispatcher can
//! hand the kernel a negative `c_int` without any further translation.

use strum::FromRepr;

/// An error code returned by some CatalogFS operation.
///
/// Discriminants equal the corresponding `errno.h` value so `code()` can be
/// handed straight to the FUSE reply as `-code()`.
#[derive(FromRepr, Clone, Copy, Debug, Eq, PartialEq)]
#[repr(i32)]
pub enum CatalogErrno {
    /// Operation not permitted.
    Perm = 1,
    /// No such file or directory.
    NoEnt = 2,
    /// Input/output error.
    Io = 5,
    /// Bad file descriptor.
    BadF = 9,
    /// Out of memory.
    NoMem = 12,
    /// Permission denied.
    Acces = 13,
    /// File exists.
    Exist = 17,
    /// Cross-device link.
    XDev = 18,
    /// Not a directory.
    NotDir = 20,
    /// Is a directory.
    IsDir = 21,
    /// Invalid argument.
    Inval = 22,
    /// Too many open files.
    NFile = 23,
    /// File too large.
    FBig = 27,
    /// No space left on device.
    NoSpc = 28,
    /// Illegal seek.
    SPipe = 29,
    /// Read-only file system.
    RoFs = 30,
    /// Too many links.
    MLink = 31,
    /// Numerical result out of range.
    Range = 34,
    /// Directory not empty.
    NotEmpty = 39,
    /// Too many symbolic links encountered (loop).
    Loop = 40,
    /// File name too long.
    NameTooLong = 36,
    /// Function not implemented.
    NoSys = 38,
}

impl CatalogErrno {
    /// A short, stable, lowercase-with-hyphens name for this code.
    ///
    /// Used by the logger so log lines read as e.g. `access-denied` rather
    /// than a bare number.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Perm => "operation-not-permitted",
            Self::NoEnt => "no-such-file",
            Self::Io => "io-error",
            Self::BadF => "bad-file-descriptor",
            Self::NoMem => "no-memory",
            Self::Acces => "access-denied",
            Self::Exist => "file-exists",
            Self::XDev => "cross-device-link",
            Self::NotDir => "not-a-directory",
            Self::IsDir => "is-a-directory",
            Self::Inval => "invalid-argument",
            Self::NFile => "too-many-open-files",
            Self::FBig => "file-too-large",
            Self::NoSpc => "no-space-left",
            Self::SPipe => "illegal-seek",
            Self::RoFs => "read-only-filesystem",
            Self::MLink => "too-many-links",
            Self::Range => "overflow",
            Self::NotEmpty => "directory-not-empty",
            Self::Loop => "too-many-symlinks",
            Self::NameTooLong => "name-too-long",
            Self::NoSys => "not-implemented",
        }
    }

    /// Recover a `CatalogErrno` from a raw errno value observed from a
    /// syscall. Unknown codes collapse to `Io` rather than panicking —
    /// unlike a kernel's own error space, we don't control every errno a
    /// host libc might someday return.
    pub fn from_i32(value: i32) -> Self {
        Self::from_repr(value).unwrap_or(Self::Io)
    }

    /// The raw errno value, suitable for `-code()` in a FUSE reply.
    pub const fn code(self) -> i32 {
        self as i32
    }
}

impl From<nix::Error> for CatalogErrno {
    fn from(err: nix::Error) -> Self {
        Self::from_i32(err as i32)
    }
}

impl From<std::io::Error> for CatalogErrno {
    fn from(err: std::io::Error) -> Self {
        match err.raw_os_error() {
            Some(code) => Self::from_i32(code),
            None => Self::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_round_trips_through_from_i32() {
        assert_eq!(CatalogErrno::from_i32(13), CatalogErrno::Acces);
        assert_eq!(CatalogErrno::Acces.code(), 13);
    }

    #[test]
    fn unknown_code_collapses_to_io() {
        assert_eq!(CatalogErrno::from_i32(9999), CatalogErrno::Io);
    }

    #[test]
    fn as_str_is_stable_and_hyphenated() {
        assert_eq!(CatalogErrno::Acces.as_str(), "access-denied");
        assert_eq!(CatalogErrno::Inval.as_str(), "invalid-argument");
    }
}
