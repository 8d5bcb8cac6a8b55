//! Library scanning, catalog reconciliation and page media.
//!
//! A library is a content root holding one directory per title, each of
//! which holds episodes: directories of page images, or zip/rar archives of
//! them. This crate keeps a [`toonshelf_catalog`] in step with that tree:
//!
//! - [`classify`] turns a title directory into ordered episode candidates,
//!   sniffing archive formats from their magic bytes.
//! - [`reconcile`] walks the whole root and streams [`ReconcileEvent`]s as it
//!   creates, re-indexes and flags catalog entries.
//! - [`ScanJobController`] runs at most one reconciliation pass in the
//!   background and exposes a pollable [`ScanStatus`].
//! - [`MediaResolver`] turns an `(episode, filename)` pair back into a chunked
//!   byte stream, refusing anything outside the episode.

mod classify;
pub mod error;
pub mod job;
pub mod media;
mod order;
pub mod reconcile;

pub use crate::classify::{Candidate, classify};
pub use crate::job::{ScanJobController, ScanStarted, ScanStatus};
pub use crate::media::{MediaResolver, Page, PageStream};
pub use crate::order::extract_number;
pub use crate::reconcile::{ReconcileEvent, ScanMode, Summary, TitleReport, reconcile};

use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long a blocking archive open may take before the archive is treated
/// as unreadable.
pub const DEFAULT_ARCHIVE_OPEN_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings shared by every reconciliation pass.
#[derive(Debug, Clone)]
pub struct Context {
    root: PathBuf,
    archive_open_timeout: Duration,
}
impl Context {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), archive_open_timeout: DEFAULT_ARCHIVE_OPEN_TIMEOUT }
    }

    #[must_use]
    pub fn with_archive_open_timeout(mut self, timeout: Duration) -> Self {
        self.archive_open_timeout = timeout;
        self
    }

    /// The content root: one subdirectory per title.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn archive_open_timeout(&self) -> Duration {
        self.archive_open_timeout
    }
}
