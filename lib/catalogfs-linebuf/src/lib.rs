//! A delimiter-aware buffered line reader with a hard size cap.
//!
//! This is the tokenization primitive the sidecar format codec is built on:
//! it knows nothing about `key=value` syntax, only about finding the next
//! run of bytes up to (and including) one of two delimiter bytes.

use std::io::Read;

const DEFAULT_START_CAPACITY: usize = 120;

/// Error reading a line.
#[derive(thiserror::Error, Debug)]
pub enum LineBufError {
    /// One more byte would exceed the caller-supplied cap.
    #[error("line exceeds maximum size of {0} bytes")]
    Overflow(usize),
    /// The underlying stream returned an error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The outcome of reading one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// A full line, terminated by one of the delimiters. The delimiter byte
    /// is included.
    Complete(Vec<u8>),
    /// The stream ended before any delimiter was seen, but at least one
    /// byte was read first.
    PartialEof(Vec<u8>),
    /// The stream ended with zero bytes read — a clean EOF.
    Eof,
}

/// Read the next line from `reader`.
///
/// `primary` and `secondary` are delimiter bytes; `secondary` may be `None`
/// to consider only `primary`. `max_size` caps the number of bytes that may
/// be accumulated before a delimiter is found; `0` means unbounded.
pub fn read_line<R: Read>(
    reader: &mut R,
    primary: u8,
    secondary: Option<u8>,
    max_size: usize,
) -> Result<Line, LineBufError> {
    let start_capacity = if max_size == 0 {
        DEFAULT_START_CAPACITY
    } else {
        max_size.min(DEFAULT_START_CAPACITY)
    };
    let mut buf = Vec::with_capacity(start_capacity);
    let mut byte = [0u8; 1];

    loop {
        let n = reader.read(&mut byte)?;
        if n == 0 {
            return Ok(if buf.is_empty() {
                Line::Eof
            } else {
                Line::PartialEof(buf)
            });
        }

        if max_size != 0 && buf.len() == max_size {
            return Err(LineBufError::Overflow(max_size));
        }
        buf.push(byte[0]);

        if byte[0] == primary || secondary == Some(byte[0]) {
            return Ok(Line::Complete(buf));
        }
    }
}
