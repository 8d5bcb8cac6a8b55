//! SQLite catalog of titles, episodes and pages.
//!
//! The catalog is a derived index of the library root: it can always be
//! rebuilt by scanning. What it adds over the filesystem is *identity*:
//! title and episode ids are assigned once and never change or get reused,
//! so records kept elsewhere (reading progress, bookmarks) keep pointing at
//! the right thing across rescans.
//!
//! # Architecture
//! - **Titles** are matched across scans by name.
//! - **Episodes** are matched by (title, name) and carry their location as an
//!   [`EpisodeSource`]: a directory, or an archive of a known kind.
//! - **Pages** are owned by their episode and replaced wholesale whenever the
//!   episode is re-indexed.
//!
//! Nothing is ever deleted by a scan; entities that disappear from disk are
//! flagged unavailable instead.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::models::{EntityKind, Episode, EpisodeKind, EpisodeSource, NewEpisode, Page, Title};
pub use crate::repo::Repository;
