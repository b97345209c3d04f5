use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{BigEndian, WriteBytesExt};
use parking_lot::RwLockWriteGuard;

use super::state::StoreState;
use crate::backing::BackingFile;
use crate::error::Result;
use crate::index::IndexEntry;
use crate::record;

/// Incremental reader over one record's payload window, on a private
/// read handle. Reads stop at the end of the payload regardless of what
/// follows in the backing file.
pub struct RecordReader {
    file: File,
    remaining: u32,
}

impl RecordReader {
    pub(super) fn open(backing: &Path, entry: IndexEntry) -> Result<Self> {
        let mut file = BackingFile::open_readonly(backing)?.into_file();
        file.seek(SeekFrom::Start(entry.offset))?;
        Ok(Self {
            file,
            remaining: entry.size,
        })
    }

    /// Payload bytes left in the window.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

impl Read for RecordReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let cap = buf.len().min(self.remaining as usize);
        let n = self.file.read(&mut buf[..cap])?;
        self.remaining -= n as u32;
        Ok(n)
    }
}

/// Incremental writer appending one record while holding the store's
/// exclusive lock. The header goes down with a zero placeholder size;
/// closing the writer backpatches the real size, indexes the record, and
/// releases the lock. Dropping without `finish` closes best-effort.
pub struct RecordWriter<'a> {
    state: RwLockWriteGuard<'a, StoreState>,
    file: File,
    path: String,
    size_offset: u64,
    payload_offset: u64,
    written: u32,
    closed: bool,
}

impl<'a> RecordWriter<'a> {
    pub(super) fn open(
        state: RwLockWriteGuard<'a, StoreState>,
        backing: &Path,
        path: &str,
    ) -> Result<Self> {
        let mut file = BackingFile::open(backing)?.into_file();
        file.seek(SeekFrom::End(0))?;
        record::encode_path(&mut file, path)?;
        let size_offset = file.stream_position()?;
        file.write_i32::<BigEndian>(0)?;
        file.write_u8(record::TOMBSTONE_LIVE)?;
        let payload_offset = file.stream_position()?;

        Ok(Self {
            state,
            file,
            path: path.to_string(),
            size_offset,
            payload_offset,
            written: 0,
            closed: false,
        })
    }

    /// Total payload bytes accepted so far.
    pub fn written(&self) -> u32 {
        self.written
    }

    /// Backpatches the header size, indexes the record, and releases the
    /// store's exclusive lock.
    pub fn finish(mut self) -> Result<()> {
        self.close()
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.file.seek(SeekFrom::Start(self.size_offset))?;
        self.file.write_i32::<BigEndian>(self.written as i32)?;
        self.file.flush()?;
        self.state.index.insert(
            self.path.clone(),
            IndexEntry {
                size: self.written,
                offset: self.payload_offset,
            },
        );
        Ok(())
    }
}

impl Write for RecordWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = i32::MAX as u64 - self.written as u64;
        if buf.len() as u64 > room {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "record payload exceeds the size limit",
            ));
        }
        let n = self.file.write(buf)?;
        self.written += n as u32;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Drop for RecordWriter<'_> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
