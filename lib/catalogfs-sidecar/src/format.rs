//! Sidecar reader: current format (v3) plus two legacy dialects.

use std::io::Read;

use catalogfs_linebuf::{read_line, Line};

use crate::{error::SidecarError, Metadata};

/// Header that marks the current (v3) format.
pub const HEADER_CURRENT: &str = "CatalogFS=3";
/// First legacy header, read-only.
pub const HEADER_LEGACY_V1: &str = "CatalogFS.File.1";
/// Second legacy header, read-only.
pub const HEADER_LEGACY_V2: &str = "CatalogFS.File.2";

/// Maximum length of the header line itself, including its newline.
pub const MAX_HEADER_LENGTH: usize = 120;
/// Maximum length of a key, before the separator.
pub const MAX_KEY_LENGTH: usize = 1024;
/// Maximum length of a value, after the separator.
pub const MAX_VALUE_LENGTH: usize = 1_048_576;
/// Maximum total sidecar size.
pub const MAX_FILE_SIZE: u64 = 1_048_576;

const COMMENT_CHARS: [u8; 2] = [b'#', b';'];
const LEGACY_TERMINAL_KEYS: [&str; 2] = ["name", "path"];

#[derive(Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Current,
    Legacy,
}

impl Dialect {
    fn separator(self) -> u8 {
        match self {
            Dialect::Current => b'=',
            Dialect::Legacy => b':',
        }
    }
}

/// Parse a sidecar file from `reader`, overlaying recognized fields onto
/// `skeleton`. Fields the file doesn't mention keep their skeleton value.
pub fn read_sidecar<R: Read>(
    reader: &mut R,
    skeleton: Metadata,
) -> Result<Metadata, SidecarError> {
    let header_line = read_line(reader, b'\n', Some(b'\r'), MAX_HEADER_LENGTH)?;
    let header_bytes = match header_line {
        Line::Complete(bytes) | Line::PartialEof(bytes) => bytes,
        Line::Eof => return Err(SidecarError::HeaderMismatch),
    };
    let mut total_bytes = header_bytes.len() as u64;
    let header_text = trim_newline(&header_bytes);

    let dialect = if header_text == HEADER_CURRENT.as_bytes() {
        Dialect::Current
    } else if header_text == HEADER_LEGACY_V1.as_bytes()
        || header_text == HEADER_LEGACY_V2.as_bytes()
    {
        Dialect::Legacy
    } else {
        return Err(SidecarError::HeaderMismatch);
    };

    let mut record = skeleton;

    loop {
        let line = read_line(reader, b'\n', Some(b'\r'), MAX_FILE_SIZE as usize)?;
        let bytes = match line {
            Line::Complete(bytes) | Line::PartialEof(bytes) => bytes,
            Line::Eof => break,
        };

        total_bytes += bytes.len() as u64;
        if total_bytes > MAX_FILE_SIZE {
            return Err(SidecarError::SizeLimitExceeded(MAX_FILE_SIZE));
        }

        let content = trim_newline(&bytes);
        let trimmed = trim_ascii_whitespace(content);
        if trimmed.is_empty() {
            continue;
        }
        if COMMENT_CHARS.contains(&trimmed[0]) {
            continue;
        }

        let sep = dialect.separator();
        let Some(sep_pos) = trimmed.iter().position(|&b| b == sep) else {
            continue;
        };
        let key = trim_ascii_whitespace(&trimmed[..sep_pos]);
        let value = trim_ascii_whitespace(&trimmed[sep_pos + 1..]);

        if key.is_empty() {
            return Err(SidecarError::EmptyKey);
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(SidecarError::KeyTooLong);
        }
        if value.len() > MAX_VALUE_LENGTH {
            return Err(SidecarError::ValueTooLong);
        }

        let key_str = String::from_utf8_lossy(key);

        if dialect == Dialect::Legacy && LEGACY_TERMINAL_KEYS.contains(&key_str.as_ref()) {
            break;
        }

        apply_field(&mut record, &key_str, value)?;
    }

    validate_non_negative(&record)?;
    Ok(record)
}

fn apply_field(record: &mut Metadata, key: &str, value: &[u8]) -> Result<(), SidecarError> {
    let text = std::str::from_utf8(value).ok();
    match key {
        "size" => record.size = parse_i64(text, "size")?,
        "blocks" => record.blocks = parse_i64(text, "blocks")?,
        "mode" => record.mode = parse_u32(text, "mode")?,
        "uid" => record.uid = parse_u32(text, "uid")?,
        "gid" => record.gid = parse_u32(text, "gid")?,
        "atime" => record.atime = parse_i64(text, "atime")?,
        "mtime" => record.mtime = parse_i64(text, "mtime")?,
        "ctime" => record.ctime = parse_i64(text, "ctime")?,
        "atimensec" => record.atimensec = parse_i64(text, "atimensec")?,
        "mtimensec" => record.mtimensec = parse_i64(text, "mtimensec")?,
        "ctimensec" => record.ctimensec = parse_i64(text, "ctimensec")?,
        "nlink" => record.nlink = parse_u64(text, "nlink")?,
        "blksize" => record.blksize = parse_i64(text, "blksize")?,
        // Unknown keys are forward-compatible noise: ignore silently.
        _ => {}
    }
    Ok(())
}

fn parse_i64(text: Option<&str>, field: &'static str) -> Result<i64, SidecarError> {
    text.and_then(|s| s.parse::<i64>().ok())
        .ok_or(SidecarError::MalformedValue(field))
}

fn parse_u32(text: Option<&str>, field: &'static str) -> Result<u32, SidecarError> {
    text.and_then(|s| s.parse::<u32>().ok())
        .ok_or(SidecarError::MalformedValue(field))
}

fn parse_u64(text: Option<&str>, field: &'static str) -> Result<u64, SidecarError> {
    text.and_then(|s| s.parse::<u64>().ok())
        .ok_or(SidecarError::MalformedValue(field))
}

fn validate_non_negative(record: &Metadata) -> Result<(), SidecarError> {
    let checks: [(i64, &'static str); 9] = [
        (record.size, "size"),
        (record.blocks, "blocks"),
        (record.atime, "atime"),
        (record.mtime, "mtime"),
        (record.ctime, "ctime"),
        (record.atimensec, "atimensec"),
        (record.mtimensec, "mtimensec"),
        (record.ctimensec, "ctimensec"),
        (record.blksize, "blksize"),
    ];
    for (value, name) in checks {
        if value < 0 {
            return Err(SidecarError::NegativeField(name));
        }
    }
    Ok(())
}

fn trim_newline(bytes: &[u8]) -> &[u8] {
    let mut end = bytes.len();
    while end > 0 && (bytes[end - 1] == b'\n' || bytes[end - 1] == b'\r') {
        end -= 1;
    }
    &bytes[..end]
}

fn trim_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |p| p + 1);
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(contents: &[u8]) -> Result<Metadata, SidecarError> {
        let mut cur = Cursor::new(contents.to_vec());
        read_sidecar(&mut cur, Metadata::default())
    }

    #[test]
    fn round_trips_all_fields_through_current_format() {
        let record = parse(
            b"CatalogFS=3\n\
              size=100\n\
              blocks=1\n\
              mode=33188\n\
              uid=1000\n\
              gid=1000\n\
              atime=1700000000\n\
              mtime=1700000001\n\
              ctime=1700000002\n\
              atimensec=1\n\
              mtimensec=2\n\
              ctimensec=3\n\
              nlink=1\n\
              blksize=4096\n",
        )
        .unwrap();
        assert_eq!(record.size, 100);
        assert_eq!(record.mode, 33188);
        assert_eq!(record.nlink, 1);
        assert_eq!(record.blksize, 4096);
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let record = parse(b"CatalogFS=3\n# a comment\n\n  \nsize=10\n;also a comment\n").unwrap();
        assert_eq!(record.size, 10);
    }

    #[test]
    fn unknown_keys_are_silently_ignored() {
        let record = parse(b"CatalogFS=3\nsize=10\nfuture_field=hi\nmtime=1700000000\n").unwrap();
        assert_eq!(record.size, 10);
        assert_eq!(record.mtime, 1700000000);
    }

    #[test]
    fn header_mismatch_is_rejected() {
        let err = parse(b"NotCatalogFS\nsize=1\n").unwrap_err();
        assert!(matches!(err, SidecarError::HeaderMismatch));
    }

    #[test]
    fn negative_value_is_rejected() {
        let err = parse(b"CatalogFS=3\nsize=-1\n").unwrap_err();
        assert!(matches!(err, SidecarError::NegativeField("size")));
    }

    #[test]
    fn legacy_v2_dialect_parses_with_colon_separator_and_terminates_on_name() {
        let record = parse(b"CatalogFS.File.2\nsize:4096\nmode:33188\nname:whatever\nsize:0\n")
            .unwrap();
        assert_eq!(record.size, 4096);
        assert_eq!(record.mode, 33188);
    }

    #[test]
    fn missing_fields_retain_skeleton_values() {
        let mut cur = Cursor::new(b"CatalogFS=3\nsize=10\n".to_vec());
        let skeleton = Metadata {
            nlink: 7,
            blksize: 512,
            ..Metadata::default()
        };
        let record = read_sidecar(&mut cur, skeleton).unwrap();
        assert_eq!(record.size, 10);
        assert_eq!(record.nlink, 7);
        assert_eq!(record.blksize, 512);
    }

    #[test]
    fn oversized_sidecar_is_rejected_by_cumulative_size() {
        let mut contents = b"CatalogFS=3\n".to_vec();
        // Many short comment lines, each well under the per-line cap, whose
        // total still exceeds the 1 MiB sidecar cap.
        let comment_line = vec![b'#'; 200];
        for _ in 0..6000 {
            contents.extend_from_slice(&comment_line);
            contents.push(b'\n');
        }
        let err = parse(&contents).unwrap_err();
        assert!(matches!(err, SidecarError::SizeLimitExceeded(MAX_FILE_SIZE)));
    }

    #[test]
    fn single_line_over_cap_overflows() {
        let mut contents = b"CatalogFS=3\n".to_vec();
        contents.extend(std::iter::repeat(b'#').take(2_000_000));
        contents.push(b'\n');
        let err = parse(&contents).unwrap_err();
        assert!(matches!(err, SidecarError::LineTooLong(_)));
    }
}
