//! Sidecar writer: always emits the current (v3) format.

use std::io::{Seek, SeekFrom, Write};

use crate::error::SidecarError;
use crate::Metadata;

/// Write `record` as a v3 sidecar into `writer`, starting from position 0.
///
/// Emits exactly 14 lines: the header, then one line per field in the
/// fixed order `size, blocks, mode, uid, gid, atime, mtime, ctime,
/// atimensec, mtimensec, ctimensec, nlink, blksize`.
pub fn write_sidecar<W: Write + Seek>(
    writer: &mut W,
    record: &Metadata,
) -> Result<(), SidecarError> {
    writer.seek(SeekFrom::Start(0))?;
    writer.write_all(b"CatalogFS=3\n")?;
    writeln!(writer, "size={}", record.size)?;
    writeln!(writer, "blocks={}", record.blocks)?;
    writeln!(writer, "mode={}", record.mode)?;
    writeln!(writer, "uid={}", record.uid)?;
    writeln!(writer, "gid={}", record.gid)?;
    writeln!(writer, "atime={}", record.atime)?;
    writeln!(writer, "mtime={}", record.mtime)?;
    writeln!(writer, "ctime={}", record.ctime)?;
    writeln!(writer, "atimensec={}", record.atimensec)?;
    writeln!(writer, "mtimensec={}", record.mtimensec)?;
    writeln!(writer, "ctimensec={}", record.ctimensec)?;
    writeln!(writer, "nlink={}", record.nlink)?;
    writeln!(writer, "blksize={}", record.blksize)?;
    Ok(())
}

/// Write `record` into `file`, truncating any prior contents first. This is
/// the entry point the dispatcher's flush/release path uses; the plain
/// [`write_sidecar`] above is kept generic over `Write + Seek` so tests can
/// target an in-memory cursor instead of a real file.
pub fn write_sidecar_to_file(
    file: &mut std::fs::File,
    record: &Metadata,
) -> Result<(), SidecarError> {
    file.set_len(0)?;
    write_sidecar(file, record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::read_sidecar;
    use std::io::Cursor;

    #[test]
    fn writer_emits_exactly_fourteen_lines_in_fixed_order() {
        let record = Metadata {
            size: 100,
            blocks: 1,
            mode: 33188,
            uid: 1000,
            gid: 1000,
            atime: 1,
            mtime: 2,
            ctime: 3,
            atimensec: 4,
            mtimensec: 5,
            ctimensec: 6,
            nlink: 1,
            blksize: 4096,
        };
        let mut cur = Cursor::new(Vec::new());
        write_sidecar(&mut cur, &record).unwrap();
        let contents = cur.into_inner();
        let text = String::from_utf8(contents).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 14);
        assert_eq!(lines[0], "CatalogFS=3");
        assert_eq!(
            lines[1..],
            vec![
                "size=100",
                "blocks=1",
                "mode=33188",
                "uid=1000",
                "gid=1000",
                "atime=1",
                "mtime=2",
                "ctime=3",
                "atimensec=4",
                "mtimensec=5",
                "ctimensec=6",
                "nlink=1",
                "blksize=4096",
            ]
        );
    }

    #[test]
    fn write_then_read_round_trips_every_field() {
        let record = Metadata {
            size: 12345,
            blocks: 25,
            mode: 0o100644,
            uid: 7,
            gid: 8,
            atime: 111,
            mtime: 222,
            ctime: 333,
            atimensec: 444,
            mtimensec: 555,
            ctimensec: 666,
            nlink: 3,
            blksize: 4096,
        };
        let mut cur = Cursor::new(Vec::new());
        write_sidecar(&mut cur, &record).unwrap();
        cur.set_position(0);
        let parsed = read_sidecar(&mut cur, Metadata::default()).unwrap();
        assert_eq!(parsed, record);
    }
}
