mod episode;
mod page;
mod title;

pub(crate) use self::episode::{EpisodeRow, checked_name, order_key_to_sql};
pub use self::episode::{Episode, EpisodeKind, EpisodeSource, NewEpisode};
pub(crate) use self::page::PageRow;
pub use self::page::Page;
pub(crate) use self::title::TitleRow;
pub use self::title::Title;

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use std::path::Path;
use time::UtcDateTime;

/// The three kinds of catalog entity that carry an availability flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Title,
    Episode,
    Page,
}

pub(crate) fn path_to_sql(path: &Path, what: &'static str) -> Result<String> {
    Ok(path.to_str().ok_or_raise(|| ErrorKind::InvalidData(what))?.to_string())
}

pub(crate) fn timestamp_from_sql(value: i64, what: &'static str) -> Result<UtcDateTime> {
    UtcDateTime::from_unix_timestamp(value).or_raise(|| ErrorKind::InvalidData(what))
}
