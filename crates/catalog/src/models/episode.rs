use crate::error::{Error, ErrorKind, Result};
use crate::models::{path_to_sql, timestamp_from_sql};
use exn::{OptionExt, ResultExt};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use time::UtcDateTime;
use toonshelf_archive::ArchiveKind;

/// How an episode's pages are stored on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EpisodeKind {
    Directory,
    Zip,
    Rar,
}
impl EpisodeKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EpisodeKind::Directory => "directory",
            EpisodeKind::Zip => ArchiveKind::Zip.as_str(),
            EpisodeKind::Rar => ArchiveKind::Rar.as_str(),
        }
    }
}
impl Display for EpisodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
impl FromStr for EpisodeKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "directory" => Ok(EpisodeKind::Directory),
            "zip" => Ok(EpisodeKind::Zip),
            "rar" => Ok(EpisodeKind::Rar),
            _ => exn::bail!(ErrorKind::InvalidData("episode kind")),
        }
    }
}
impl From<ArchiveKind> for EpisodeKind {
    fn from(kind: ArchiveKind) -> Self {
        match kind {
            ArchiveKind::Zip => EpisodeKind::Zip,
            ArchiveKind::Rar => EpisodeKind::Rar,
        }
    }
}

/// Where an episode lives. Exactly one location, and its kind decides which.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EpisodeSource {
    /// A directory of page images.
    Directory(PathBuf),
    /// A zip or rar archive of page images.
    Archive(ArchiveKind, PathBuf),
}
impl EpisodeSource {
    pub fn kind(&self) -> EpisodeKind {
        match self {
            EpisodeSource::Directory(_) => EpisodeKind::Directory,
            EpisodeSource::Archive(kind, _) => EpisodeKind::from(*kind),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            EpisodeSource::Directory(path) | EpisodeSource::Archive(_, path) => path,
        }
    }

    /// Split into the `(source_path, archive_path)` column pair.
    pub(crate) fn to_columns(&self) -> Result<(Option<String>, Option<String>)> {
        Ok(match self {
            EpisodeSource::Directory(path) => (Some(path_to_sql(path, "episode source path")?), None),
            EpisodeSource::Archive(_, path) => (None, Some(path_to_sql(path, "episode archive path")?)),
        })
    }

    fn from_columns(kind: EpisodeKind, source: Option<String>, archive: Option<String>) -> Result<Self> {
        Ok(match (kind, source, archive) {
            (EpisodeKind::Directory, Some(path), None) => EpisodeSource::Directory(PathBuf::from(path)),
            (EpisodeKind::Zip, None, Some(path)) => EpisodeSource::Archive(ArchiveKind::Zip, PathBuf::from(path)),
            (EpisodeKind::Rar, None, Some(path)) => EpisodeSource::Archive(ArchiveKind::Rar, PathBuf::from(path)),
            _ => exn::bail!(ErrorKind::InvalidData("episode source")),
        })
    }
}

/// An episode as first discovered, before the catalog assigns it an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEpisode {
    pub name: String,
    pub order_key: u64,
    pub source: EpisodeSource,
}

/// A chapter or issue of a title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    pub id: i64,
    pub title_id: i64,
    /// Directory or archive file name; unique within the title.
    pub name: String,
    /// Sort key derived from the first number in the name. Not an identifier.
    pub order_key: u64,
    pub source: EpisodeSource,
    /// First page, used as the cover in listings.
    pub thumbnail: Option<String>,
    pub available: bool,
    pub discovered_at: UtcDateTime,
    /// Last time the page list was (re)built.
    pub indexed_at: Option<UtcDateTime>,
}
impl Episode {
    pub fn kind(&self) -> EpisodeKind {
        self.source.kind()
    }
}

/// SQLite integers are signed; keys past `i64::MAX` all sort last together.
pub(crate) fn order_key_to_sql(key: u64) -> i64 {
    i64::try_from(key).unwrap_or(i64::MAX)
}

#[derive(sqlx::FromRow)]
pub(crate) struct EpisodeRow {
    id: i64,
    title_id: i64,
    name: String,
    order_key: i64,
    kind: String,
    source_path: Option<String>,
    archive_path: Option<String>,
    thumbnail: Option<String>,
    available: bool,
    discovered_at: i64,
    indexed_at: Option<i64>,
}
impl TryFrom<EpisodeRow> for Episode {
    type Error = Error;
    fn try_from(row: EpisodeRow) -> Result<Self> {
        let kind = row.kind.parse::<EpisodeKind>()?;
        Ok(Self {
            id: row.id,
            title_id: row.title_id,
            name: row.name,
            order_key: u64::try_from(row.order_key).or_raise(|| ErrorKind::InvalidData("episode order key"))?,
            source: EpisodeSource::from_columns(kind, row.source_path, row.archive_path)?,
            thumbnail: row.thumbnail,
            available: row.available,
            discovered_at: timestamp_from_sql(row.discovered_at, "episode discovery date")?,
            indexed_at: row.indexed_at.map(|ts| timestamp_from_sql(ts, "episode index date")).transpose()?,
        })
    }
}

/// Check a title-relative name is usable as a key before it reaches SQL.
pub(crate) fn checked_name(name: &str) -> Result<&str> {
    Some(name).filter(|n| !n.is_empty()).ok_or_raise(|| ErrorKind::InvalidData("empty name"))
}
