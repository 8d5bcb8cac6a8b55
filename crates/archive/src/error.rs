//! Archive Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The archive could not be opened or parsed. Don't retry with the same file.
    #[display("unreadable archive: {}", _0.display())]
    Unreadable(#[error(not(source))] PathBuf),
    /// The archive opened fine but has no entry with the requested name.
    #[display("entry not found: {_0}")]
    EntryNotFound(#[error(not(source))] String),
    /// Opening the archive took longer than the configured limit.
    #[display("timed out opening archive: {}", _0.display())]
    Timeout(#[error(not(source))] PathBuf),
    /// The requested format name is not a supported container.
    #[display("unsupported format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// Reading entry data failed part-way through.
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// The blocking worker died before reporting back.
    #[display("archive worker failed")]
    Worker,
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout(_))
    }

    /// Returns `true` if the requested content does not exist, as opposed to
    /// the archive itself being broken.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EntryNotFound(_))
    }
}
