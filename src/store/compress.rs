use std::collections::HashSet;

use super::Store;
use crate::error::{Error, Result};

/// Transparent compression decorator: compresses payloads on write and
/// decompresses on read, delegating every other operation to the inner
/// store unchanged. The inner store only ever sees compressed bytes.
pub struct CompressedStore<S: Store> {
    inner: S,
}

impl<S: Store> CompressedStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// A reference to the wrapped store.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Store> Store for CompressedStore<S> {
    fn exists(&self, path: &str) -> bool {
        self.inner.exists(path)
    }

    fn list(&self, path: &str) -> HashSet<String> {
        self.inner.list(path)
    }

    fn find(&self, name: &str) -> Vec<String> {
        self.inner.find(name)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let compressed = self.inner.read(path)?;
        snap::raw::Decoder::new()
            .decompress_vec(&compressed)
            .map_err(|e| Error::Malformed(format!("decompression failed: {e}")))
    }

    fn write(&self, path: &str, contents: &[u8], overwrite: bool) -> Result<()> {
        let compressed = snap::raw::Encoder::new()
            .compress_vec(contents)
            .map_err(|e| Error::Io(format!("compression failed: {e}")))?;
        self.inner.write(path, &compressed, overwrite)
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.inner.delete(path)
    }
}
