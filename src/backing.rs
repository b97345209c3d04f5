use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Random-access adapter over the host file backing a store. All reads
/// and writes address absolute offsets; appends land at the current end
/// of the file. The same path may be held open by several adapters
/// within one process.
#[derive(Debug)]
pub struct BackingFile {
    file: File,
    path: PathBuf,
}

impl BackingFile {
    /// Opens the file for reading and writing, creating it empty if it
    /// does not exist.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::options()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Opens an existing file for reading only.
    pub fn open_readonly(path: &Path) -> Result<Self> {
        let file = File::options().read(true).open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Creates a fresh file, failing if the path already exists.
    pub fn create_new(path: &Path) -> Result<Self> {
        let file = File::options()
            .create_new(true)
            .read(true)
            .write(true)
            .open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Current length of the file in bytes.
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Reads exactly `len` bytes starting at `offset`.
    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Writes `bytes` starting at `offset`, overwriting in place.
    pub fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        Ok(())
    }

    /// Appends `bytes` at the end of the file, returning the offset at
    /// which the write began.
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        let offset = self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(bytes)?;
        Ok(offset)
    }

    /// Shortens the file to `len` bytes.
    pub fn truncate(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        Ok(())
    }

    /// A second handle on the same file, with an independent cursor.
    pub fn try_clone(&self) -> Result<File> {
        Ok(self.file.try_clone()?)
    }

    /// Unwraps the adapter into its file handle.
    pub fn into_file(self) -> File {
        self.file
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_missing_file() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("store.bin");
        assert!(!path.exists());

        let backing = BackingFile::open(&path).expect("Failed to open backing file");
        assert!(path.exists());
        assert!(backing.is_empty().expect("Failed to stat backing file"));
        assert_eq!(backing.path(), path.as_path());
    }

    #[test]
    fn test_append_returns_start_offsets() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("store.bin");
        let mut backing = BackingFile::open(&path).expect("Failed to open backing file");

        assert_eq!(backing.append(b"hello").expect("Failed to append"), 0);
        assert_eq!(backing.append(b"world").expect("Failed to append"), 5);
        assert_eq!(backing.len().expect("Failed to stat"), 10);
    }

    #[test]
    fn test_read_and_write_at_offsets() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("store.bin");
        let mut backing = BackingFile::open(&path).expect("Failed to open backing file");

        backing.append(b"abcdef").expect("Failed to append");
        assert_eq!(backing.read_at(2, 3).expect("Failed to read"), b"cde");

        backing.write_at(1, b"XY").expect("Failed to write");
        assert_eq!(backing.read_at(0, 6).expect("Failed to read"), b"aXYdef");
        // In-place writes do not grow the file.
        assert_eq!(backing.len().expect("Failed to stat"), 6);
    }

    #[test]
    fn test_read_past_end_fails() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("store.bin");
        let mut backing = BackingFile::open(&path).expect("Failed to open backing file");

        backing.append(b"abc").expect("Failed to append");
        assert!(backing.read_at(1, 10).is_err());
    }

    #[test]
    fn test_truncate() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("store.bin");
        let mut backing = BackingFile::open(&path).expect("Failed to open backing file");

        backing.append(b"abcdef").expect("Failed to append");
        backing.truncate(2).expect("Failed to truncate");
        assert_eq!(backing.len().expect("Failed to stat"), 2);
        assert_eq!(backing.read_at(0, 2).expect("Failed to read"), b"ab");
    }

    #[test]
    fn test_create_new_refuses_existing_file() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("store.bin");
        BackingFile::open(&path).expect("Failed to open backing file");

        assert!(BackingFile::create_new(&path).is_err());
    }

    #[test]
    fn test_open_readonly_requires_existing_file() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("missing.bin");
        assert!(BackingFile::open_readonly(&path).is_err());
    }
}
