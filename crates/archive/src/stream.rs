//! Listing and streaming on Tokio's blocking pool.
//!
//! Archive libraries are synchronous, so each call hands the work to a
//! blocking worker. For streams, the worker owns the archive and entry
//! handles for the whole lifetime of the stream and pushes chunks through a
//! bounded channel; the handles are dropped on whichever comes first of the
//! entry ending, a read failing, or the consumer dropping the stream.

use crate::error::{Error, ErrorKind, Result};
use crate::format::{Archive, Format};
use crate::{ArchiveKind, CHUNK_SIZE};
use bytes::Bytes;
use exn::ResultExt;
use futures::stream::{self, BoxStream};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::instrument;

/// A lazy, forward-only stream of [`CHUNK_SIZE`] chunks.
///
/// Every chunk except the last is exactly [`CHUNK_SIZE`] bytes. Read errors
/// part-way through arrive as a single [`Io`](ErrorKind::Io) item, after
/// which the stream ends.
pub type ImageStream = BoxStream<'static, Result<Bytes>>;

// Chunks buffered ahead of the consumer.
const CHANNEL_DEPTH: usize = 4;

/// List the image members of an archive, sorted lexicographically.
///
/// Fails with [`Unreadable`](ErrorKind::Unreadable) if the archive cannot be
/// opened or parsed, or [`Timeout`](ErrorKind::Timeout) if that takes longer
/// than `timeout`.
#[instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
pub async fn try_list_images(kind: ArchiveKind, path: impl AsRef<Path>, timeout: Duration) -> Result<Vec<String>> {
    let path = path.as_ref().to_path_buf();
    let worker_path = path.clone();
    let worker = tokio::task::spawn_blocking(move || Archive::open(kind, &worker_path)?.image_names());
    match tokio::time::timeout(timeout, worker).await {
        Ok(joined) => joined.or_raise(|| ErrorKind::Worker)?,
        Err(_) => exn::bail!(ErrorKind::Timeout(path)),
    }
}

/// List the image members of an archive, treating any failure as "no pages".
///
/// A broken or slow archive must not abort a library scan, so failures are
/// logged and reported as an empty listing.
pub async fn list_images(kind: ArchiveKind, path: impl AsRef<Path>, timeout: Duration) -> Vec<String> {
    let path = path.as_ref();
    match try_list_images(kind, path, timeout).await {
        Ok(names) => names,
        Err(err) => {
            tracing::warn!(path = %path.display(), %kind, error = ?err, "Could not list archive; treating as empty");
            Vec::new()
        },
    }
}

/// Stream a single archive member in [`CHUNK_SIZE`] chunks.
///
/// The archive and the entry are both opened before this returns, so a
/// missing entry is reported as [`EntryNotFound`](ErrorKind::EntryNotFound)
/// rather than as the first stream item. No data is read until the stream is
/// polled.
#[instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
pub async fn stream_image(
    kind: ArchiveKind,
    path: impl AsRef<Path>,
    name: &str,
    timeout: Duration,
) -> Result<ImageStream> {
    let path = path.as_ref().to_path_buf();
    let (ready_tx, ready_rx) = oneshot::channel();
    let (chunk_tx, chunk_rx) = mpsc::channel(CHANNEL_DEPTH);
    tokio::task::spawn_blocking({
        let path = path.clone();
        let name = name.to_string();
        move || stream_worker(kind, path, name, ready_tx, chunk_tx)
    });

    match tokio::time::timeout(timeout, ready_rx).await {
        Ok(Ok(Ok(()))) => {},
        Ok(Ok(Err(err))) => return Err(err),
        // The worker dropped its end without reporting, which only happens on panic.
        Ok(Err(_)) => exn::bail!(ErrorKind::Worker),
        Err(_) => exn::bail!(ErrorKind::Timeout(path)),
    }

    Ok(Box::pin(stream::unfold(chunk_rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    })))
}

fn stream_worker(
    kind: ArchiveKind,
    path: PathBuf,
    name: String,
    ready: oneshot::Sender<Result<()>>,
    chunks: mpsc::Sender<Result<Bytes>>,
) {
    let mut archive = match Archive::open(kind, &path) {
        Ok(archive) => archive,
        Err(err) => {
            _ = ready.send(Err(err));
            return;
        },
    };
    let reader = match archive.open_entry(&name) {
        Ok(reader) => reader,
        Err(err) => {
            _ = ready.send(Err(err));
            return;
        },
    };
    // Nobody is waiting any more (timed out), so don't bother reading.
    if ready.send(Ok(())).is_err() {
        return;
    }
    pump(reader, &chunks);
    tracing::trace!(path = %path.display(), entry = %name, "Archive stream finished");
}

/// Copy `reader` into `chunks` until EOF, a read error, or the receiver is dropped.
pub(crate) fn pump(mut reader: impl Read, chunks: &mpsc::Sender<Result<Bytes>>) {
    loop {
        let mut buffer = Vec::with_capacity(CHUNK_SIZE);
        match reader.by_ref().take(CHUNK_SIZE as u64).read_to_end(&mut buffer) {
            Ok(0) => return,
            Ok(_) => {
                if chunks.blocking_send(Ok(Bytes::from(buffer))).is_err() {
                    return;
                }
            },
            Err(err) => {
                _ = chunks.blocking_send(Err(Error::from(ErrorKind::Io(err))));
                return;
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::tests::{write_rar, write_zip};
    use futures::StreamExt;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_list_images_from_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chapter1.cbr");
        write_zip(
            &path,
            &[("ch1/", b""), ("ch1/002.png", b"b"), ("ch1/001.jpg", b"a"), ("ComicInfo.xml", b"<x/>")],
        );
        let names = list_images(ArchiveKind::Zip, &path, TIMEOUT).await;
        assert_eq!(names, vec!["ch1/001.jpg", "ch1/002.png"]);
    }

    #[tokio::test]
    async fn test_list_images_corrupt_archive_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.cbz");
        std::fs::write(&path, b"PK\x03\x04 truncated").unwrap();
        assert!(list_images(ArchiveKind::Zip, &path, TIMEOUT).await.is_empty());
        let err = try_list_images(ArchiveKind::Zip, &path, TIMEOUT).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unreadable(_)));
    }

    #[tokio::test]
    async fn test_list_images_corrupt_rar_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.cbr");
        std::fs::write(&path, b"Rar!\x1A\x07\x00 truncated").unwrap();
        assert!(list_images(ArchiveKind::Rar, &path, TIMEOUT).await.is_empty());
    }

    #[tokio::test]
    async fn test_list_images_from_rar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chapter2.cbr");
        write_rar(&path, &[("010.webp", b"c"), ("ComicInfo.xml", b"<x/>"), ("002.png", b"b"), ("001.JPG", b"a")]);
        let names = try_list_images(ArchiveKind::Rar, &path, TIMEOUT).await.unwrap();
        assert_eq!(names, vec!["001.JPG", "002.png", "010.webp"]);
    }

    #[tokio::test]
    async fn test_stream_rar_entry_is_chunked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ch2.cbr");
        let data: Vec<u8> = (0..(CHUNK_SIZE * 2 + 100)).map(|i| (i % 251) as u8).collect();
        write_rar(&path, &[("001.jpg", b"cover"), ("big.webp", &data)]);
        let chunks: Vec<Bytes> = stream_image(ArchiveKind::Rar, &path, "big.webp", TIMEOUT)
            .await
            .unwrap()
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;
        let sizes: Vec<usize> = chunks.iter().map(Bytes::len).collect();
        assert_eq!(sizes, vec![CHUNK_SIZE, CHUNK_SIZE, 100]);
        assert_eq!(chunks.concat(), data);
    }

    #[tokio::test]
    async fn test_stream_rar_missing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ch2.cbr");
        write_rar(&path, &[("001.jpg", b"a")]);
        let err = stream_image(ArchiveKind::Rar, &path, "002.jpg", TIMEOUT).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::EntryNotFound(name) if name == "002.jpg"));
    }

    #[tokio::test]
    async fn test_stream_corrupt_rar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.cbr");
        std::fs::write(&path, b"Rar!\x1A\x07\x00 truncated").unwrap();
        let err = stream_image(ArchiveKind::Rar, &path, "001.jpg", TIMEOUT).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::Unreadable(_)));
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_stream_small_entry_is_one_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ch1.zip");
        write_zip(&path, &[("001.jpg", b"\xFF\xD8\xFF tiny jpeg")]);
        let chunks: Vec<_> = stream_image(ArchiveKind::Zip, &path, "001.jpg", TIMEOUT).await.unwrap().collect().await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap(), &Bytes::from_static(b"\xFF\xD8\xFF tiny jpeg"));
    }

    #[tokio::test]
    async fn test_stream_large_entry_is_chunked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ch1.zip");
        let data: Vec<u8> = (0..(CHUNK_SIZE * 2 + 100)).map(|i| (i % 251) as u8).collect();
        write_zip(&path, &[("big.png", &data)]);
        let chunks: Vec<Bytes> = stream_image(ArchiveKind::Zip, &path, "big.png", TIMEOUT)
            .await
            .unwrap()
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;
        let sizes: Vec<usize> = chunks.iter().map(Bytes::len).collect();
        assert_eq!(sizes, vec![CHUNK_SIZE, CHUNK_SIZE, 100]);
        assert_eq!(chunks.concat(), data);
    }

    #[tokio::test]
    async fn test_stream_missing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ch1.zip");
        write_zip(&path, &[("001.jpg", b"a")]);
        let err = stream_image(ArchiveKind::Zip, &path, "002.jpg", TIMEOUT).await.err().unwrap();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_stream_unreadable_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.zip");
        let err = stream_image(ArchiveKind::Zip, &path, "001.jpg", TIMEOUT).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::Unreadable(_)));
    }

    #[test]
    fn test_pump_stops_when_consumer_drops() {
        let (tx, mut rx) = mpsc::channel(1);
        // An endless entry: only the consumer going away can stop the worker.
        let worker = std::thread::spawn(move || pump(std::io::repeat(7), &tx));
        let first = rx.blocking_recv().unwrap().unwrap();
        assert_eq!(first.len(), CHUNK_SIZE);
        drop(rx);
        worker.join().unwrap();
    }

    #[test]
    fn test_pump_reports_read_errors() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk on fire"))
            }
        }
        let (tx, mut rx) = mpsc::channel(CHANNEL_DEPTH);
        pump(Failing, &tx);
        drop(tx);
        let item = rx.blocking_recv().unwrap();
        assert!(matches!(&*item.unwrap_err(), ErrorKind::Io(_)));
        assert!(rx.blocking_recv().is_none());
    }
}
