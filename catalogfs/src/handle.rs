//! Per-open file handles: the state that lives from `create()`/`open()` to
//! `release()`, as described by the state machine in the component design.

use std::collections::HashMap;
use std::os::fd::OwnedFd;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// State for one open file instance: the underlying descriptor and the
/// running maximum of `offset + size` across every write.
pub struct OpenHandle {
    pub fd: OwnedFd,
    pub accumulator: i64,
}

impl OpenHandle {
    pub fn new(fd: OwnedFd) -> Self {
        Self { fd, accumulator: 0 }
    }

    /// Fold in one write: `accumulator <- max(accumulator, offset + size)`.
    pub fn record_write(&mut self, offset: i64, size: i64) {
        self.accumulator = self.accumulator.max(offset + size);
    }
}

/// Maps the runtime's opaque file-handle integers to their `OpenHandle`.
pub struct HandleTable {
    next_fh: AtomicU64,
    handles: Mutex<HashMap<u64, OpenHandle>>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            next_fh: AtomicU64::new(1),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate a fresh handle id for `fd`, returning the id to hand back
    /// to the runtime.
    pub fn insert(&self, fd: OwnedFd) -> u64 {
        let fh = self.next_fh.fetch_add(1, Ordering::Relaxed);
        self.handles.lock().unwrap().insert(fh, OpenHandle::new(fd));
        fh
    }

    /// Run `f` against the handle for `fh`, if it's still live.
    pub fn with_handle<T>(&self, fh: u64, f: impl FnOnce(&mut OpenHandle) -> T) -> Option<T> {
        let mut handles = self.handles.lock().unwrap();
        handles.get_mut(&fh).map(f)
    }

    /// Remove and return the handle for `fh`, e.g. on `release()`.
    pub fn remove(&self, fh: u64) -> Option<OpenHandle> {
        self.handles.lock().unwrap().remove(&fh)
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::FromRawFd;

    fn dummy_fd() -> OwnedFd {
        // A duplicate of stdin is a harmless, always-valid descriptor for
        // handle-table bookkeeping tests that never touch its contents.
        unsafe { OwnedFd::from_raw_fd(libc::dup(0)) }
    }

    #[test]
    fn write_accumulator_takes_the_running_maximum() {
        let mut handle = OpenHandle::new(dummy_fd());
        handle.record_write(0, 50);
        handle.record_write(1000, 10);
        assert_eq!(handle.accumulator, 1010);
        handle.record_write(0, 5);
        assert_eq!(handle.accumulator, 1010);
    }

    #[test]
    fn handle_table_issues_distinct_ids_and_removes_on_release() {
        let table = HandleTable::new();
        let a = table.insert(dummy_fd());
        let b = table.insert(dummy_fd());
        assert_ne!(a, b);
        assert!(table.remove(a).is_some());
        assert!(table.remove(a).is_none());
    }
}
