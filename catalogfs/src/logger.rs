//! A structured, file-backed logger: every dispatcher entry and exit is
//! recorded as timestamp, operation, path, and result code, optionally
//! restricted to failures only.
//!
//! Adapted from the teacher's `SimpleLogger` (a bare struct implementing
//! `log::Log`, set once via `log::set_logger`) but backed by a real file
//! instead of a console sink, since this runs in userspace rather than
//! kernel space.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use log::{LevelFilter, Log, Metadata, Record};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

struct CatalogLogger {
    sink: Mutex<BufWriter<File>>,
    errors_only: AtomicBool,
}

impl Log for CatalogLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if self.errors_only.load(Ordering::Relaxed) && record.level() != log::Level::Error {
            return;
        }
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown-time".to_string());
        let mut sink = self.sink.lock().unwrap();
        let _ = writeln!(
            sink,
            "{timestamp} {level} {target} {message}",
            level = record.level(),
            target = record.target(),
            message = record.args(),
        );
        let _ = sink.flush();
    }

    fn flush(&self) {
        let _ = self.sink.lock().unwrap().flush();
    }
}

/// Install a process-wide logger writing to `path`.
///
/// If this is never called, no logger is installed at all: every
/// `log::*!` call site compiles down to a cheap level check against the
/// default no-op logger, matching "a log path may be supplied" — logging
/// is entirely optional, not merely quiet by default.
pub fn init(path: &Path, errors_only: bool) -> std::io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let logger = CatalogLogger {
        sink: Mutex::new(BufWriter::new(file)),
        errors_only: AtomicBool::new(errors_only),
    };
    log::set_boxed_logger(Box::new(logger))
        .map(|()| log::set_max_level(LevelFilter::Trace))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
}

/// Format a dispatcher call's entry/exit the way `spec.md` §6 requires:
/// operation, path, and result code.
pub fn call_result(operation: &str, path: &std::path::Path, result: i32) -> String {
    if result == 0 {
        format!("{operation} {path:?} -> ok")
    } else {
        let code = catalogfs_errno::CatalogErrno::from_i32(-result).as_str();
        format!("{operation} {path:?} -> {code}")
    }
}
