mod compaction;
mod compress;
mod pack;
mod recovery;
mod state;
mod stream;

pub use compress::CompressedStore;
pub use pack::PackStore;
pub use stream::{RecordReader, RecordWriter};

use std::collections::HashSet;

use crate::error::Result;

/// The capability set shared by the store and its decorators. Paths are
/// opaque strings; `/` separators are a client convention, not
/// structure.
pub trait Store {
    /// True if any stored path starts with `path`.
    fn exists(&self, path: &str) -> bool;

    /// Every stored path with the given prefix; an empty prefix lists
    /// everything.
    fn list(&self, path: &str) -> HashSet<String>;

    /// Every stored path whose suffix is `name`, sorted.
    fn find(&self, name: &str) -> Vec<String>;

    /// Reads the full payload stored at `path`.
    fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Stores `contents` at `path`. With `overwrite` unset, an existing
    /// path is an error and the stored value is left untouched.
    fn write(&self, path: &str, contents: &[u8], overwrite: bool) -> Result<()>;

    /// Removes the record at `path`.
    fn delete(&self, path: &str) -> Result<()>;
}
