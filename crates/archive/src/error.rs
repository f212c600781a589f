//! Errors raised while walking a source tree or replaying an archive stream
//! onto a destination tree (`spec.md` §4.7).

use thiserror::Error;

/// Errors specific to the directory ↔ stream adapter.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// A manifest entry's relative path escaped the destination root via a
    /// `..` component.
    #[error("path {0:?} escapes the destination root")]
    PathEscape(String),
    /// A manifest line couldn't be parsed as a well-formed entry record.
    #[error("malformed manifest entry: {0}")]
    MalformedEntry(#[from] control::RecordError),
    /// Walking the source tree failed.
    #[error("directory walk failed: {0}")]
    Walk(String),
    /// An I/O operation on the source or destination tree failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ArchiveError> for std::io::Error {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::Io(err) => err,
            other => std::io::Error::other(other),
        }
    }
}
