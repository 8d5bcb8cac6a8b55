//! Config Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration loading.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A source could not be parsed, or a value has the wrong type.
    #[display("could not load configuration")]
    Load,
    /// A config file was named explicitly but does not exist.
    #[display("config file not found: {}", _0.display())]
    MissingFile(#[error(not(source))] PathBuf),
    /// The config file extension is not one of toml, yaml, yml or json.
    #[display("unsupported config file format: {}", _0.display())]
    UnsupportedFormat(#[error(not(source))] PathBuf),
    /// Every source loaded, but the merged result makes no sense.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] &'static str),
    /// No home directory to derive default config and data locations from.
    #[display("could not determine the home directory")]
    NoHomeDirectory,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
