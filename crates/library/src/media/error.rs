//! Error types for the [`media`](super) module.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A media error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a page could not be served.
///
/// Callers facing the outside world should collapse everything for which
/// [`is_not_found`](ErrorKind::is_not_found) holds into a single "not found"
/// answer, so a request cannot probe what exists outside an episode.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("episode not found: {_0}")]
    EpisodeNotFound(#[error(not(source))] i64),
    /// The episode is catalogued but its directory or archive has gone.
    #[display("episode source is missing: {}", _0.display())]
    MissingSource(#[error(not(source))] PathBuf),
    #[display("page not found: {_0}")]
    EntryNotFound(#[error(not(source))] String),
    /// The requested name leads outside the episode, lexically or through a
    /// symlink.
    #[display("page path escapes its episode: {_0}")]
    PathEscape(#[error(not(source))] String),
    #[display("catalog lookup failed")]
    Catalog,
    /// The archive exists but could not be opened in time, or at all.
    #[display("episode archive is unreadable")]
    Archive,
    /// Reading page data failed part-way through.
    #[display("I/O error while reading page")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Catalog | ErrorKind::Io)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ErrorKind::EpisodeNotFound(_)
                | ErrorKind::MissingSource(_)
                | ErrorKind::EntryNotFound(_)
                | ErrorKind::PathEscape(_)
        )
    }
}
