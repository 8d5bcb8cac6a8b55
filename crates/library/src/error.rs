//! Library error types.
//!
//! Each larger module ([`reconcile`](crate::reconcile), [`media`](crate::media))
//! has its own error tree; this top-level kind wraps them at the public
//! stream boundary so callers can tell which subsystem failed.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("library reconciliation failed")]
    Reconcile,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ErrorKind::Reconcile => false,
        }
    }
}
