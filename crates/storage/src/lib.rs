//! Local filesystem access for the library root.
//!
//! Everything the scanner and the media resolver do on disk goes through a
//! [`LocalBackend`] anchored at a directory: listing immediate children,
//! sniffing file heads, streaming page files in chunks, and resolving
//! untrusted relative paths without ever leaving the anchor.

pub mod error;
mod local;
mod models;
mod path;

pub use crate::local::{FileInfoStream, FileStream, LocalBackend};
pub use crate::models::{EntryType, FileInfo};
pub use crate::path::validate as validate_path;
