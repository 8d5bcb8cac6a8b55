//! Catalog reconciliation.
//!
//! Walks the content root (titles, then their episodes) and brings the
//! [catalog](toonshelf_catalog) in line with what is on disk. Nothing is ever
//! deleted: entries whose files disappear are flagged unavailable and come
//! back when the files do.
//!
//! Two [`ScanMode`]s exist. A regular pass only adds episodes it has not
//! seen before. A thorough pass also refreshes the location, kind and page
//! list of every episode it finds.
//!
//! The primary entry point is [`reconcile`], which streams
//! [`ReconcileEvent`]s so callers can report progress as titles complete.

pub mod error;
mod stream;
mod title;

pub use self::stream::{ReconcileEvent, reconcile};
pub(crate) use self::stream::reconcile_events;

use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// How much work a pass does for episodes already in the catalog.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Add new episodes; leave known ones alone.
    #[default]
    Regular,
    /// Re-index every episode found, updating kind and location in place.
    Thorough,
}
impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Regular => "regular",
            ScanMode::Thorough => "thorough",
        }
    }
}
impl Display for ScanMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// What happened to one title during a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TitleReport {
    /// Absent when the title could not be recorded in the catalog at all.
    pub title_id: Option<i64>,
    pub name: String,
    /// Episodes seen for the first time.
    pub created: u64,
    /// Known episodes re-indexed by a thorough pass.
    pub reindexed: u64,
    /// Known episodes left untouched by a regular pass.
    pub skipped: u64,
    /// Known episodes that were unavailable and have reappeared.
    pub restored: u64,
    /// Known episodes that are no longer on disk.
    pub unavailable: u64,
    pub errors: u64,
    /// The pass was cancelled before every episode was visited.
    pub cancelled: bool,
}
impl TitleReport {
    pub(crate) fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Self::default() }
    }
}

/// Totals for a whole pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub titles: u64,
    pub titles_unavailable: u64,
    pub created: u64,
    pub reindexed: u64,
    pub skipped: u64,
    pub restored: u64,
    pub unavailable: u64,
    pub errors: u64,
}
impl Summary {
    pub(crate) fn record(&mut self, report: &TitleReport) {
        self.titles += 1;
        self.created += report.created;
        self.reindexed += report.reindexed;
        self.skipped += report.skipped;
        self.restored += report.restored;
        self.unavailable += report.unavailable;
        self.errors += report.errors;
    }
}
