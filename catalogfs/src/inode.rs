//! A permanent inode number table mapping the kernel's opaque `ino` handles
//! onto the relative paths the rest of the dispatcher works with.
//!
//! `fuser`'s low-level API is inode-addressed; everything else in this
//! crate is path-addressed, since that's how the sidecar format and
//! converters are specified. This table is the seam between the two.
//!
//! Entries are never evicted on `forget`. The catalog this filesystem
//! overlays is read mostly as a tree of small text files; holding every
//! looked-up path's inode for the life of the mount is cheap, and it
//! sidesteps having to reconcile `forget`'s reference counting with
//! in-flight operations under a strictly single-threaded dispatcher.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::relpath;

/// The inode number `fuser` reserves for the mount root.
pub const ROOT_INO: u64 = 1;

pub struct InodeTable {
    next_ino: AtomicU64,
    path_to_ino: Mutex<HashMap<PathBuf, u64>>,
    ino_to_path: Mutex<HashMap<u64, PathBuf>>,
}

impl InodeTable {
    pub fn new() -> Self {
        let mut path_to_ino = HashMap::new();
        let mut ino_to_path = HashMap::new();
        let root = PathBuf::from(relpath::ROOT);
        path_to_ino.insert(root.clone(), ROOT_INO);
        ino_to_path.insert(ROOT_INO, root);
        Self {
            next_ino: AtomicU64::new(ROOT_INO + 1),
            path_to_ino: Mutex::new(path_to_ino),
            ino_to_path: Mutex::new(ino_to_path),
        }
    }

    /// Look up the relative path for `ino`, if it has been seen.
    pub fn path_of(&self, ino: u64) -> Option<PathBuf> {
        self.ino_to_path.lock().unwrap().get(&ino).cloned()
    }

    /// Intern `path`, returning its existing inode number or allocating a
    /// fresh one.
    pub fn intern(&self, path: PathBuf) -> u64 {
        let mut path_to_ino = self.path_to_ino.lock().unwrap();
        if let Some(&ino) = path_to_ino.get(&path) {
            return ino;
        }
        let ino = self.next_ino.fetch_add(1, Ordering::Relaxed);
        path_to_ino.insert(path.clone(), ino);
        self.ino_to_path.lock().unwrap().insert(ino, path);
        ino
    }

    /// Re-home every path under `old_parent` (inclusive) to sit under
    /// `new_parent` instead. Called after a successful rename so future
    /// lookups by inode see the new location.
    pub fn rename(&self, old_path: &Path, new_path: &Path) {
        let mut path_to_ino = self.path_to_ino.lock().unwrap();
        let mut ino_to_path = self.ino_to_path.lock().unwrap();

        let affected: Vec<PathBuf> = path_to_ino
            .keys()
            .filter(|p| *p == old_path || p.starts_with(old_path))
            .cloned()
            .collect();

        for old in affected {
            let Some(ino) = path_to_ino.remove(&old) else {
                continue;
            };
            let rebased = if old == old_path {
                new_path.to_path_buf()
            } else {
                new_path.join(old.strip_prefix(old_path).unwrap())
            };
            ino_to_path.insert(ino, rebased.clone());
            path_to_ino.insert(rebased, ino);
        }
    }

    /// Drop the path for `ino` after a successful unlink/rmdir, so a later
    /// rename into its old spot gets a fresh inode number.
    pub fn forget_path(&self, path: &Path) {
        let mut path_to_ino = self.path_to_ino.lock().unwrap();
        if let Some(ino) = path_to_ino.remove(path) {
            self.ino_to_path.lock().unwrap().remove(&ino);
        }
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}
