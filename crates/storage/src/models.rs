//! Storage models.

use std::path::PathBuf;

/// What a directory entry turned out to be, after following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Directory,
    File,
}

/// Metadata for one immediate child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Relative path from the backend root
    pub path: PathBuf,
    /// Final path component; always valid UTF-8
    pub name: String,
    /// Size in bytes (zero for directories)
    pub size: u64,
    pub entry_type: EntryType,
}
impl FileInfo {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>, size: u64, entry_type: EntryType) -> Self {
        Self { path: path.into(), name: name.into(), size, entry_type }
    }

    pub fn is_dir(&self) -> bool {
        self.entry_type == EntryType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.entry_type == EntryType::File
    }
}
