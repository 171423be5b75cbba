//! CatalogFS: a FUSE overlay that presents metadata-only sidecar files as
//! the original files they describe.

pub mod attr;
pub mod cli;
pub mod context;
pub mod dispatcher;
pub mod handle;
pub mod inode;
pub mod logger;
pub mod relpath;
