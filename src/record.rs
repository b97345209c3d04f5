use std::io::{ErrorKind, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

/// Tombstone byte of a live record.
pub const TOMBSTONE_LIVE: u8 = 0;

/// Tombstone byte of a deleted record. Any nonzero value counts as
/// deleted on read; this is the value written.
pub const TOMBSTONE_DELETED: u8 = 1;

/// A decoded record header. Each record on disk is, in order: a 2-byte
/// big-endian path length, the UTF-8 path bytes, a 4-byte big-endian
/// signed payload size, the tombstone byte, and the payload itself.
/// Records are laid out back to back from offset 0; there is no file
/// header, footer, or checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub path: String,
    pub size: u32,
    pub deleted: bool,
}

/// Writes the path field: a 2-byte big-endian length followed by the
/// UTF-8 path bytes. Fails on an empty path or one longer than 65,535
/// bytes.
pub fn encode_path<W: Write>(writer: &mut W, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::Malformed("record path must not be empty".to_string()));
    }
    if path.len() > u16::MAX as usize {
        return Err(Error::Malformed(format!(
            "record path of {} bytes exceeds the {} byte limit",
            path.len(),
            u16::MAX
        )));
    }
    writer.write_u16::<BigEndian>(path.len() as u16)?;
    writer.write_all(path.as_bytes())?;
    Ok(())
}

/// Writes a full record header with a live tombstone. The payload is the
/// caller's to write next.
pub fn encode_header<W: Write>(writer: &mut W, path: &str, size: u32) -> Result<()> {
    if size > i32::MAX as u32 {
        return Err(Error::Malformed(format!(
            "record size {size} exceeds the {} byte limit",
            i32::MAX
        )));
    }
    encode_path(writer, path)?;
    writer.write_i32::<BigEndian>(size as i32)?;
    writer.write_u8(TOMBSTONE_LIVE)?;
    Ok(())
}

/// Reads a record header at the reader's current position, leaving the
/// reader at the first payload byte. Truncated input, an empty path,
/// invalid UTF-8, and a negative size all decode as `Malformed`.
pub fn decode_header<R: Read>(reader: &mut R) -> Result<RecordHeader> {
    let path_len = reader
        .read_u16::<BigEndian>()
        .map_err(|e| decode_error("path length", e))?;
    if path_len == 0 {
        return Err(Error::Malformed("record path must not be empty".to_string()));
    }

    let mut path_buf = vec![0u8; path_len as usize];
    reader
        .read_exact(&mut path_buf)
        .map_err(|e| decode_error("path", e))?;
    let path = String::from_utf8(path_buf)
        .map_err(|_| Error::Malformed("record path is not valid UTF-8".to_string()))?;

    let size = reader
        .read_i32::<BigEndian>()
        .map_err(|e| decode_error("size", e))?;
    if size < 0 {
        return Err(Error::Malformed(format!("negative record size {size}")));
    }

    let deleted = reader
        .read_u8()
        .map_err(|e| decode_error("tombstone", e))?
        != TOMBSTONE_LIVE;

    Ok(RecordHeader {
        path,
        size: size as u32,
        deleted,
    })
}

/// Header length in bytes for a record at `path`: length prefix, path
/// bytes, size field, tombstone byte.
pub fn header_len(path: &str) -> u64 {
    2 + path.len() as u64 + 4 + 1
}

/// Absolute offset of the tombstone byte, given a record's payload
/// offset. This is the single byte a delete flips.
pub fn tombstone_offset(payload_offset: u64) -> u64 {
    payload_offset - 1
}

fn decode_error(field: &'static str, err: std::io::Error) -> Error {
    if err.kind() == ErrorKind::UnexpectedEof {
        Error::Malformed(format!("truncated record {field}"))
    } else {
        Error::Io(err.to_string())
    }
}
