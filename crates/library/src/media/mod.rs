//! Page media for readers.
//!
//! Turns an `(episode id, filename)` pair from an untrusted caller back into
//! page bytes. Directory episodes are served from disk through
//! [`LocalBackend`], which refuses any name that resolves outside the episode
//! directory. Archive episodes are served straight out of the archive.
//! Either way the page arrives as a stream of chunks and is never loaded
//! whole.

pub mod error;

use crate::DEFAULT_ARCHIVE_OPEN_TIMEOUT;
use crate::media::error::{ErrorKind, Result};
use bytes::Bytes;
use exn::{OptionExt, ResultExt};
use futures::StreamExt;
use futures::stream::BoxStream;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use std::time::Duration;
use toonshelf_archive::error::ErrorKind as ArchiveErrorKind;
use toonshelf_archive::{ArchiveKind, content_type, stream_image};
use toonshelf_catalog::{EpisodeSource, Repository};
use toonshelf_storage::LocalBackend;
use toonshelf_storage::error::ErrorKind as StorageErrorKind;
use tracing::instrument;

/// Page contents in chunks of at most 64 KiB.
pub type PageStream = BoxStream<'static, Result<Bytes>>;

/// A page ready to be sent.
pub struct Page {
    /// MIME type guessed from the filename.
    pub content_type: &'static str,
    pub stream: PageStream,
}
impl Debug for Page {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Page").field("content_type", &self.content_type).finish_non_exhaustive()
    }
}

/// Serves page files of catalogued episodes.
#[derive(Debug, Clone)]
pub struct MediaResolver {
    catalog: Repository,
    archive_open_timeout: Duration,
}
impl MediaResolver {
    pub fn new(catalog: Repository) -> Self {
        Self { catalog, archive_open_timeout: DEFAULT_ARCHIVE_OPEN_TIMEOUT }
    }

    #[must_use]
    pub fn with_archive_open_timeout(mut self, timeout: Duration) -> Self {
        self.archive_open_timeout = timeout;
        self
    }

    /// Open page `name` of episode `episode_id`.
    ///
    /// For directory episodes `name` is relative to the episode directory;
    /// for archive episodes it is the full member path inside the archive.
    ///
    /// # Errors
    ///
    /// Unknown episodes, vanished sources, missing pages and names that
    /// escape the episode all satisfy [`ErrorKind::is_not_found`].
    #[instrument(level = "debug", skip(self))]
    pub async fn resolve(&self, episode_id: i64, name: &str) -> Result<Page> {
        let episode = self
            .catalog
            .get_episode(episode_id)
            .await
            .or_raise(|| ErrorKind::Catalog)?
            .ok_or_raise(|| ErrorKind::EpisodeNotFound(episode_id))?;
        let stream = match &episode.source {
            EpisodeSource::Directory(path) => self.directory_page(path, name).await?,
            EpisodeSource::Archive(kind, path) => self.archive_page(*kind, path, name).await?,
        };
        Ok(Page { content_type: content_type(name), stream })
    }

    async fn directory_page(&self, dir: &Path, name: &str) -> Result<PageStream> {
        let episode = LocalBackend::open(dir).await.map_err(|err| {
            let kind = match &*err {
                StorageErrorKind::NotFound(_) | StorageErrorKind::InvalidPath(_) => {
                    ErrorKind::MissingSource(dir.to_path_buf())
                },
                _ => ErrorKind::Io,
            };
            err.raise(kind)
        })?;
        let file = episode.open_stream(name).await.map_err(|err| {
            let kind = match &*err {
                StorageErrorKind::NotFound(_) => ErrorKind::EntryNotFound(name.to_string()),
                StorageErrorKind::InvalidPath(_) | StorageErrorKind::Escape(_) => {
                    tracing::warn!(dir = %dir.display(), name, "Refusing page outside its episode");
                    ErrorKind::PathEscape(name.to_string())
                },
                _ => ErrorKind::Io,
            };
            err.raise(kind)
        })?;
        Ok(Box::pin(file.map(|chunk| chunk.or_raise(|| ErrorKind::Io))))
    }

    async fn archive_page(&self, kind: ArchiveKind, path: &Path, name: &str) -> Result<PageStream> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                exn::bail!(ErrorKind::MissingSource(path.to_path_buf()))
            },
            Err(err) => return Err(err).or_raise(|| ErrorKind::Io),
        };
        if !metadata.is_file() {
            exn::bail!(ErrorKind::MissingSource(path.to_path_buf()));
        }
        let entries = stream_image(kind, path, name, self.archive_open_timeout).await.map_err(|err| {
            let kind = if matches!(&*err, ArchiveErrorKind::EntryNotFound(_)) {
                ErrorKind::EntryNotFound(name.to_string())
            } else {
                ErrorKind::Archive
            };
            err.raise(kind)
        })?;
        Ok(Box::pin(entries.map(|chunk| chunk.or_raise(|| ErrorKind::Io))))
    }
}
