use crate::error::{ErrorKind, Result};
use crate::format::{Entry, Format};
use ::zip::ZipArchive;
use ::zip::result::ZipError;
use exn::ResultExt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

pub(crate) struct ZipFormat {
    path: PathBuf,
    archive: ZipArchive<BufReader<File>>,
}
impl ZipFormat {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let unreadable = || ErrorKind::Unreadable(path.to_path_buf());
        let file = File::open(path).or_raise(unreadable)?;
        let archive = ZipArchive::new(BufReader::new(file)).or_raise(unreadable)?;
        Ok(Self { path: path.to_path_buf(), archive })
    }
}

impl Format for ZipFormat {
    fn entries(&mut self) -> Result<Vec<Entry>> {
        Ok(self
            .archive
            .file_names()
            .map(|name| Entry { name: name.to_string(), is_dir: name.ends_with('/') })
            .collect())
    }

    fn open_entry<'a>(&'a mut self, name: &str) -> Result<Box<dyn Read + 'a>> {
        match self.archive.by_name(name) {
            Ok(file) if file.is_dir() => exn::bail!(ErrorKind::EntryNotFound(name.to_string())),
            Ok(file) => Ok(Box::new(file)),
            Err(ZipError::FileNotFound) => exn::bail!(ErrorKind::EntryNotFound(name.to_string())),
            Err(e) => Err(e).or_raise(|| ErrorKind::Unreadable(self.path.clone())),
        }
    }
}
