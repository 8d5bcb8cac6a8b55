//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// File or directory does not exist
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access denied by the operating system
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Path contains invalid characters, climbs above its anchor, or names
    /// something of the wrong type
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// Path is lexically fine but resolves (through symlinks) outside its anchor
    #[display("path escapes its root: {}", _0.display())]
    Escape(#[error(not(source))] PathBuf),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Returns `true` if the caller should treat the request as "no such file".
    ///
    /// Paths that are rejected for trying to escape are deliberately reported
    /// the same way as paths that don't exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::InvalidPath(_) | Self::Escape(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::NotFound(PathBuf::from("a")), true)]
    #[case(ErrorKind::InvalidPath(PathBuf::from("../a")), true)]
    #[case(ErrorKind::Escape(PathBuf::from("link")), true)]
    #[case(ErrorKind::PermissionDenied(PathBuf::from("a")), false)]
    #[case(ErrorKind::Io(IoError::other("boom")), false)]
    fn test_is_not_found(#[case] kind: ErrorKind, #[case] expected: bool) {
        assert_eq!(kind.is_not_found(), expected);
    }

    #[test]
    fn test_display() {
        assert_eq!(ErrorKind::Escape(PathBuf::from("x/y")).to_string(), "path escapes its root: x/y");
    }
}
