//! Error types for the [`reconcile`](super) module.
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A reconciliation error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a reconciliation failure.
///
/// ### Fatal Errors
/// The pass stops after yielding one of these:
/// - [`ErrorKind::RootNotFound`]
/// - [`ErrorKind::RootUnreadable`]
///
/// ### Per-unit Errors
/// Yielded for a single title or episode; the pass carries on:
/// - [`ErrorKind::Filesystem`]
/// - [`ErrorKind::Catalog`]
/// - [`ErrorKind::Episode`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The content root does not exist, or is not a directory.
    #[display("library not found: {}", _0.display())]
    RootNotFound(#[error(not(source))] PathBuf),
    /// The content root exists but cannot be listed.
    #[display("library root is unreadable: {}", _0.display())]
    RootUnreadable(#[error(not(source))] PathBuf),
    /// A title or episode directory could not be opened or listed.
    #[display("filesystem operation failed")]
    Filesystem,
    /// A read or write through [`toonshelf_catalog::Repository`] failed.
    #[display("catalog operation failed")]
    Catalog,
    /// Wraps any failure while reconciling the named episode.
    #[display("could not reconcile episode: {_0}")]
    Episode(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Catalog)
    }

    /// Returns `true` if the pass cannot continue after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::RootNotFound(_) | ErrorKind::RootUnreadable(_))
    }
}
