//! Local filesystem backend anchored at a directory.
//!
//! All paths handed to a [`LocalBackend`] are relative to its root and are
//! validated before they touch the filesystem. Listings only ever cover the
//! immediate children of a directory; the library layout is fixed at two
//! levels (titles, then episodes) so nothing here recurses.

use crate::error::{Error, ErrorKind, Result};
use crate::path::{ensure_within, validate as validate_path};
use crate::{EntryType, FileInfo};
use async_stream::stream;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;
use toonshelf_archive::{CHUNK_SIZE, is_image_name};
use tracing::instrument;

/// Stream of directory entries, one item per visible child.
pub type FileInfoStream<'a> = BoxStream<'a, Result<FileInfo>>;
/// Stream of file contents in chunks of at most [`CHUNK_SIZE`] bytes.
pub type FileStream = BoxStream<'static, Result<Bytes>>;

enum ListEntry {
    Visible(FileInfo),
    Skip,
}

/// Read-only view of one directory on the local filesystem.
///
/// # Examples
///
/// ```no_run
/// use toonshelf_storage::LocalBackend;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let library = LocalBackend::open("/srv/comics").await?;
/// for title in library.list(None).await? {
///     println!("{}", title.name);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalBackend {
    /// Absolute, but not canonicalized: symlinked roots keep the path the
    /// caller gave.
    root: PathBuf,
}
impl LocalBackend {
    /// Anchor a backend at an existing directory.
    ///
    /// Relative roots are made absolute against the working directory.
    ///
    /// # Errors
    ///
    /// [`NotFound`](ErrorKind::NotFound) if nothing exists at `root`,
    /// [`InvalidPath`](ErrorKind::InvalidPath) if it is not a directory.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = std::path::absolute(root.as_ref()).map_err(ErrorKind::Io)?;
        let metadata = fs::metadata(&root).await.map_err(|e| Self::map_io_error(e, &root))?;
        if !metadata.is_dir() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate a relative path and join it onto the root.
    pub fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    fn directory(&self, prefix: Option<&Path>) -> Result<PathBuf> {
        match prefix {
            Some(prefix) => self.absolute_path(prefix),
            None => Ok(self.root.clone()),
        }
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    /// Turn one raw directory entry into a listing entry, following symlinks.
    async fn process_entry(&self, entry: DirEntry, prefix: Option<&Path>) -> Result<ListEntry> {
        let Ok(name) = entry.file_name().into_string() else {
            tracing::debug!(path = %entry.path().display(), "Skipping entry with non-UTF8 name");
            return Ok(ListEntry::Skip);
        };
        if name.starts_with('.') {
            return Ok(ListEntry::Skip);
        }
        let path = entry.path();
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            // Broken symlink.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ListEntry::Skip),
            Err(e) => exn::bail!(Self::map_io_error(e, &path)),
        };
        let relative = match prefix {
            Some(prefix) => validate_path(prefix)?.join(&name),
            None => PathBuf::from(&name),
        };
        if metadata.is_dir() {
            return Ok(ListEntry::Visible(FileInfo::new(relative, name, 0, EntryType::Directory)));
        }
        if metadata.is_file() {
            return Ok(ListEntry::Visible(FileInfo::new(relative, name, metadata.len(), EntryType::File)));
        }
        // Sockets, FIFOs, devices.
        Ok(ListEntry::Skip)
    }

    /// Stream the visible immediate children of `prefix` (or of the root).
    ///
    /// Hidden entries (leading `.`), entries with non-UTF8 names and broken
    /// symlinks are skipped. Order is whatever the filesystem returns. A
    /// directory that cannot be opened is reported as a single error item.
    pub fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let dir = match self.directory(prefix) {
            Ok(dir) => dir,
            Err(e) => return Box::pin(futures::stream::once(async move { Err(e) })),
        };
        Box::pin(stream! {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    yield Err(Error::from(Self::map_io_error(e, &dir)));
                    return;
                },
            };
            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(Error::from(Self::map_io_error(e, &dir)));
                        break;
                    },
                };
                match self.process_entry(entry, prefix).await {
                    Ok(ListEntry::Visible(info)) => yield Ok(info),
                    Ok(ListEntry::Skip) => {},
                    Err(e) => yield Err(e),
                }
            }
        })
    }

    /// All visible immediate children of `prefix` (or of the root), sorted by name.
    #[instrument(level = "debug", skip(self), fields(root = %self.root.display()))]
    pub async fn list(&self, prefix: Option<&Path>) -> Result<Vec<FileInfo>> {
        let mut files: Vec<FileInfo> = self.list_stream(prefix).try_collect().await?;
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Names of the image files directly inside `prefix` (or the root), sorted
    /// lexicographically.
    pub async fn list_images(&self, prefix: Option<&Path>) -> Result<Vec<String>> {
        Ok(self
            .list(prefix)
            .await?
            .into_iter()
            .filter(|info| info.is_file() && is_image_name(&info.name))
            .map(|info| info.name)
            .collect())
    }

    /// Read up to `bytes` leading bytes of a file.
    pub async fn read_head(&self, path: impl AsRef<Path>, bytes: usize) -> Result<Vec<u8>> {
        let path = path.as_ref();
        let abs_path = self.absolute_path(path)?;
        let file = fs::File::open(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?;
        let mut buffer = Vec::with_capacity(bytes);
        file.take(bytes as u64).read_to_end(&mut buffer).await.map_err(ErrorKind::Io)?;
        Ok(buffer)
    }

    /// Resolve an untrusted relative path to a canonical path inside the root.
    ///
    /// The path is validated lexically first, then canonicalized so that
    /// symlinks pointing outside the root are caught as well.
    ///
    /// # Errors
    ///
    /// [`InvalidPath`](ErrorKind::InvalidPath) for lexical escapes,
    /// [`Escape`](ErrorKind::Escape) for symlink escapes,
    /// [`NotFound`](ErrorKind::NotFound) if the target does not exist.
    #[instrument(level = "debug", skip(self, path), fields(root = %self.root.display(), path = %path.as_ref().display()))]
    pub async fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let requested = path.as_ref();
        let joined = self.absolute_path(requested)?;
        let root = fs::canonicalize(&self.root).await.map_err(|e| Self::map_io_error(e, &self.root))?;
        let resolved = fs::canonicalize(&joined).await.map_err(|e| Self::map_io_error(e, requested))?;
        ensure_within(&root, &resolved, requested)?;
        Ok(resolved)
    }

    /// Open a file inside the root as a chunked stream.
    ///
    /// The path goes through [`resolve`](Self::resolve), and must name a
    /// regular file. The file handle lives inside the stream and is closed
    /// when the stream ends or is dropped.
    pub async fn open_stream(&self, path: impl AsRef<Path>) -> Result<FileStream> {
        let requested = path.as_ref();
        let resolved = self.resolve(requested).await?;
        let file = fs::File::open(&resolved).await.map_err(|e| Self::map_io_error(e, requested))?;
        let metadata = file.metadata().await.map_err(ErrorKind::Io)?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::NotFound(requested.to_path_buf()));
        }
        Ok(Box::pin(
            ReaderStream::with_capacity(file, CHUNK_SIZE).map(|chunk| chunk.map_err(|e| Error::from(ErrorKind::Io(e)))),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    async fn backend() -> (tempfile::TempDir, LocalBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::open(dir.path()).await.unwrap();
        (dir, backend)
    }

    #[tokio::test]
    async fn test_open_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = LocalBackend::open(dir.path().join("nope")).await.unwrap_err();
        assert!(matches!(&*missing, ErrorKind::NotFound(_)));
        std::fs::write(dir.path().join("file"), b"x").unwrap();
        let file = LocalBackend::open(dir.path().join("file")).await.unwrap_err();
        assert!(matches!(&*file, ErrorKind::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_list_is_sorted_and_skips_hidden() {
        let (dir, backend) = backend().await;
        std::fs::create_dir(dir.path().join("Beta")).unwrap();
        std::fs::create_dir(dir.path().join("Alpha")).unwrap();
        std::fs::create_dir(dir.path().join(".trash")).unwrap();
        std::fs::write(dir.path().join(".DS_Store"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        let listing = backend.list(None).await.unwrap();
        let names: Vec<_> = listing.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Beta", "notes.txt"]);
        assert!(listing[0].is_dir());
        assert_eq!(listing[2].size, 5);
        assert_eq!(listing[2].entry_type, EntryType::File);
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let (dir, backend) = backend().await;
        std::fs::create_dir_all(dir.path().join("Title/ch1")).unwrap();
        std::fs::write(dir.path().join("Title/ch2.cbz"), b"PK").unwrap();
        let listing = backend.list(Some(Path::new("Title"))).await.unwrap();
        let paths: Vec<_> = listing.iter().map(|f| f.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("Title/ch1"), PathBuf::from("Title/ch2.cbz")]);
    }

    #[tokio::test]
    async fn test_list_missing_directory_is_an_error() {
        let (_dir, backend) = backend().await;
        let err = backend.list(Some(Path::new("Gone"))).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_follows_symlinks_and_skips_broken_ones() {
        let (dir, backend) = backend().await;
        let elsewhere = tempfile::tempdir().unwrap();
        symlink(elsewhere.path(), dir.path().join("Linked")).unwrap();
        symlink(dir.path().join("missing"), dir.path().join("Broken")).unwrap();
        let listing = backend.list(None).await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].name, "Linked");
        assert!(listing[0].is_dir());
    }

    #[tokio::test]
    async fn test_list_images() {
        let (dir, backend) = backend().await;
        std::fs::create_dir(dir.path().join("ch1")).unwrap();
        for name in ["10.jpg", "2.PNG", "cover.webp", "info.txt", ".hidden.jpg"] {
            std::fs::write(dir.path().join("ch1").join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("ch1/sub.jpg")).unwrap();
        let images = backend.list_images(Some(Path::new("ch1"))).await.unwrap();
        assert_eq!(images, vec!["10.jpg", "2.PNG", "cover.webp"]);
    }

    #[tokio::test]
    async fn test_read_head() {
        let (dir, backend) = backend().await;
        std::fs::write(dir.path().join("file.cbz"), b"PK\x03\x04rest of the file").unwrap();
        assert_eq!(backend.read_head("file.cbz", 4).await.unwrap(), b"PK\x03\x04");
        assert_eq!(backend.read_head("file.cbz", 100).await.unwrap().len(), 20);
        assert!(backend.read_head("../file.cbz", 4).await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_rejects_traversal() {
        let (dir, backend) = backend().await;
        std::fs::write(dir.path().join("001.jpg"), b"x").unwrap();
        assert!(backend.resolve("001.jpg").await.is_ok());
        let err = backend.resolve("../../etc/passwd").await.unwrap_err();
        assert!(err.is_not_found());
        let err = backend.resolve("002.jpg").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_resolve_rejects_symlink_escape() {
        let (dir, backend) = backend().await;
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.jpg"), b"x").unwrap();
        symlink(outside.path().join("secret.jpg"), dir.path().join("001.jpg")).unwrap();
        let err = backend.resolve("001.jpg").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Escape(_)));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_open_stream_chunks() {
        let (dir, backend) = backend().await;
        let data: Vec<u8> = (0..(CHUNK_SIZE * 2 + 17)).map(|i| (i % 256) as u8).collect();
        std::fs::write(dir.path().join("big.png"), &data).unwrap();
        let chunks: Vec<Bytes> = backend.open_stream("big.png").await.unwrap().try_collect().await.unwrap();
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.len() <= CHUNK_SIZE));
        assert_eq!(chunks.concat(), data);
    }

    #[tokio::test]
    async fn test_open_stream_rejects_directories() {
        let (dir, backend) = backend().await;
        std::fs::create_dir(dir.path().join("pages")).unwrap();
        let err = backend.open_stream("pages").await.err().unwrap();
        assert!(err.is_not_found());
    }
}
