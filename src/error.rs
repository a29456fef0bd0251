//! Error types for bindery operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while converting a source tree into an EPUB.
///
/// Every variant is fatal to the run that produced it: no partial package is
/// ever returned.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error accessing '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot decode '{}' as {encoding}", path.display())]
    Encoding { path: PathBuf, encoding: String },

    #[error("Unknown text encoding: {0}")]
    UnknownEncoding(String),

    #[error("HTML processing error: {0}")]
    Html(String),

    #[error("Failed to rasterize '{}': {message}", path.display())]
    Rasterize { path: PathBuf, message: String },

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Duplicate package entry: {0}")]
    DuplicateEntry(String),

    #[error("Invalid package entry: {0}")]
    InvalidEntry(String),
}

impl Error {
    /// Wrap an I/O error with the path that caused it.
    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Read {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
