mod rar;
mod zip;

use crate::error::Result;
use crate::{ArchiveKind, is_image_name};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// A single member of an archive, as listed by its central directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Full in-archive path (`"chapter/001.jpg"`).
    pub name: String,
    /// Directory marker entries carry no data.
    pub is_dir: bool,
}

/// The operations every supported container provides.
///
/// Implementations are blocking; call them from a blocking worker.
pub trait Format {
    /// List every member of the archive, in container order.
    fn entries(&mut self) -> Result<Vec<Entry>>;
    /// Open a member by its full in-archive path for sequential reading.
    ///
    /// Fails with [`EntryNotFound`](crate::error::ErrorKind::EntryNotFound)
    /// if no file member has exactly that name.
    fn open_entry<'a>(&'a mut self, name: &str) -> Result<Box<dyn Read + 'a>>;
}

/// An opened archive whose format was chosen once, at open time.
pub struct Archive {
    kind: ArchiveKind,
    path: PathBuf,
    format: Box<dyn Format + Send>,
}
impl Archive {
    /// Open `path` as an archive of the given kind.
    ///
    /// The kind comes from content detection ([`ArchiveKind::from_magic_bytes`]),
    /// so a `.cbr` holding a zip container is opened as zip.
    #[instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
    pub fn open(kind: ArchiveKind, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let format: Box<dyn Format + Send> = match kind {
            ArchiveKind::Zip => Box::new(self::zip::ZipFormat::open(&path)?),
            ArchiveKind::Rar => Box::new(self::rar::RarFormat::open(&path)?),
        };
        Ok(Self { kind, path, format })
    }

    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full in-archive paths of every image member, sorted lexicographically.
    ///
    /// Directory markers and non-image members are dropped.
    pub fn image_names(&mut self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .entries()?
            .into_iter()
            .filter(|entry| !entry.is_dir && is_image_name(&entry.name))
            .map(|entry| entry.name)
            .collect();
        names.sort();
        Ok(names)
    }
}
impl Format for Archive {
    fn entries(&mut self) -> Result<Vec<Entry>> {
        self.format.entries()
    }

    fn open_entry<'a>(&'a mut self, name: &str) -> Result<Box<dyn Read + 'a>> {
        self.format.open_entry(name)
    }
}
