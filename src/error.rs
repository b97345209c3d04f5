use std::fmt::Display;

/// Store errors.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// A read or delete referenced a path that is not in the store.
    NotFound(String),
    /// A write without the overwrite flag hit an existing path.
    AlreadyExists(String),
    /// Undecodable on-disk data: bad length, negative size, truncated header.
    Malformed(String),
    /// An IO failure on the backing file.
    Io(String),
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::NotFound(path) => write!(f, "path not found: {path}"),
            Error::AlreadyExists(path) => write!(f, "path already exists: {path}"),
            Error::Malformed(msg) => write!(f, "malformed record: {msg}"),
            Error::Io(msg) => write!(f, "io error: {msg}"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

/// A store Result returning Error.
pub type Result<T> = std::result::Result<T, Error>;
