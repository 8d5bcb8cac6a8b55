use crate::error::{ErrorKind, Result};
use crate::format::{Entry, Format};
use exn::ResultExt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const UNPACKED_NAME: &str = "entry";

/// The unrar library only works on paths, so every operation reopens the
/// archive. Opening reads the first header up front so broken files are
/// rejected here rather than on first use.
pub(crate) struct RarFormat {
    path: PathBuf,
}
impl RarFormat {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let unreadable = || ErrorKind::Unreadable(path.to_path_buf());
        let mut listing = unrar::Archive::new(path).open_for_listing().or_raise(unreadable)?;
        // The handle is lazy; nothing is parsed until the first header.
        if let Some(header) = listing.next() {
            header.or_raise(unreadable)?;
        }
        Ok(Self { path: path.to_path_buf() })
    }

    fn unreadable(&self) -> ErrorKind {
        ErrorKind::Unreadable(self.path.clone())
    }
}

/// A single unpacked member. The private directory goes away with the reader.
struct Unpacked {
    file: File,
    _dir: TempDir,
}
impl Read for Unpacked {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

impl Format for RarFormat {
    fn entries(&mut self) -> Result<Vec<Entry>> {
        let listing = unrar::Archive::new(&self.path).open_for_listing().or_raise(|| self.unreadable())?;
        let mut entries = Vec::new();
        for header in listing {
            let header = header.or_raise(|| self.unreadable())?;
            match header.filename.to_str() {
                Some(name) => entries.push(Entry { name: name.to_string(), is_dir: header.is_directory() }),
                None => tracing::debug!(path = %self.path.display(), "Skipping non-UTF8 archive member"),
            }
        }
        Ok(entries)
    }

    fn open_entry<'a>(&'a mut self, name: &str) -> Result<Box<dyn Read + 'a>> {
        let mut archive = unrar::Archive::new(&self.path).open_for_processing().or_raise(|| self.unreadable())?;
        while let Some(header) = archive.read_header().or_raise(|| self.unreadable())? {
            let matches = header.entry().is_file() && header.entry().filename.to_str() == Some(name);
            if !matches {
                archive = header.skip().or_raise(|| self.unreadable())?;
                continue;
            }
            let dir = tempfile::tempdir().map_err(ErrorKind::Io)?;
            let target = dir.path().join(UNPACKED_NAME);
            header.extract_to(&target).or_raise(|| self.unreadable())?;
            let file = File::open(&target).map_err(ErrorKind::Io)?;
            return Ok(Box::new(Unpacked { file, _dir: dir }));
        }
        exn::bail!(ErrorKind::EntryNotFound(name.to_string()))
    }
}
