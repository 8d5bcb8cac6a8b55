use crate::Context;
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::reconcile::error::Result as ReconcileResult;
use crate::reconcile::title::{discover_titles, mark_missing_titles, reconcile_title};
use crate::reconcile::{ScanMode, Summary, TitleReport};
use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use tokio_util::sync::CancellationToken;
use toonshelf_catalog::Repository;

/// Progress events emitted by [`reconcile`] as it works through the content
/// root.
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started): exactly once.
/// 2. [`DiscoveryComplete`](Self::DiscoveryComplete): exactly once, with the
///    number of title directories found.
/// 3. [`TitleUnavailable`](Self::TitleUnavailable): once per catalog title
///    whose directory has gone.
/// 4. [`TitleStarted`](Self::TitleStarted) followed by
///    [`TitleReconciled`](Self::TitleReconciled): once per title, in name
///    order, even for titles that failed.
/// 5. [`Complete`](Self::Complete) or [`Cancelled`](Self::Cancelled): exactly
///    once, signalling the stream is finished.
///
/// A missing or unreadable content root ends the stream with an error right
/// after [`Started`](Self::Started); neither terminal event is emitted then.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    Started { mode: ScanMode },
    DiscoveryComplete(u64),
    TitleUnavailable { title_id: i64, name: String },
    TitleStarted { name: String },
    TitleReconciled(TitleReport),
    Cancelled,
    Complete(Summary),
}

/// Streams [`ReconcileEvent`]s while bringing `catalog` in line with the
/// content root of `ctx`.
///
/// Titles are reconciled one after another. `cancel` is checked before each
/// title and before each episode; once it fires the stream finishes with
/// [`Cancelled`](ReconcileEvent::Cancelled) and availability flags for the
/// unfinished title are left alone.
///
/// Per-title and per-episode failures are surfaced as `Err` items without
/// terminating the stream.
pub fn reconcile<'a>(
    ctx: &'a Context,
    catalog: &'a Repository,
    mode: ScanMode,
    cancel: &'a CancellationToken,
) -> impl Stream<Item = LibraryResult<ReconcileEvent>> + 'a {
    stream! {
        for await event in reconcile_events(ctx, catalog, mode, cancel) {
            yield event.or_raise(|| LibraryErrorKind::Reconcile);
        }
    }
}

/// The unwrapped event stream, for callers inside the crate that need to
/// inspect [`reconcile::ErrorKind`](crate::reconcile::error::ErrorKind).
pub(crate) fn reconcile_events<'a>(
    ctx: &'a Context,
    catalog: &'a Repository,
    mode: ScanMode,
    cancel: &'a CancellationToken,
) -> impl Stream<Item = ReconcileResult<ReconcileEvent>> + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        yield Ok(ReconcileEvent::Started { mode });
        tracing::info!(root = %ctx.root().display(), %mode, "Reconciling library");

        let titles = match discover_titles(ctx.root()).await {
            Ok(titles) => titles,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        // Infallible: a usize (either 32- or 64-bit) will always fit in a u64.
        yield Ok(ReconcileEvent::DiscoveryComplete(u64::try_from(titles.len()).unwrap_or(0)));

        let mut summary = Summary::default();
        match mark_missing_titles(catalog, &titles).await {
            Ok(missing) => {
                for title in missing {
                    summary.titles_unavailable += 1;
                    yield Ok(ReconcileEvent::TitleUnavailable { title_id: title.id, name: title.name });
                }
            },
            Err(e) => {
                summary.errors += 1;
                yield Err(e);
            },
        }

        for title in &titles {
            if cancel.is_cancelled() {
                tracing::info!("Reconciliation cancelled");
                yield Ok(ReconcileEvent::Cancelled);
                return;
            }
            yield Ok(ReconcileEvent::TitleStarted { name: title.name.clone() });
            let (report, errors) = reconcile_title(ctx, catalog, mode, cancel, title).await;
            for e in errors {
                tracing::warn!(title = %title.name, error = ?e, "Problem while reconciling title");
                yield Err(e);
            }
            summary.record(&report);
            let cancelled = report.cancelled;
            yield Ok(ReconcileEvent::TitleReconciled(report));
            if cancelled {
                tracing::info!("Reconciliation cancelled");
                yield Ok(ReconcileEvent::Cancelled);
                return;
            }
        }

        tracing::info!(
            titles = summary.titles,
            created = summary.created,
            reindexed = summary.reindexed,
            errors = summary.errors,
            "Reconciliation complete"
        );
        yield Ok(ReconcileEvent::Complete(summary));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::error::{Error, ErrorKind};
    use crate::tests::{write_pages, write_zip};
    use futures::StreamExt;
    use std::fs;
    use std::path::Path;
    use toonshelf_archive::ArchiveKind;
    use toonshelf_catalog::{Database, EpisodeKind, EpisodeSource};

    async fn catalog() -> Repository {
        let db = Database::connect_in_memory().await.unwrap();
        Repository::from(&db)
    }

    async fn run(root: &Path, catalog: &Repository, mode: ScanMode) -> (Vec<ReconcileEvent>, Vec<Error>) {
        run_with(root, catalog, mode, &CancellationToken::new()).await
    }

    async fn run_with(
        root: &Path,
        catalog: &Repository,
        mode: ScanMode,
        cancel: &CancellationToken,
    ) -> (Vec<ReconcileEvent>, Vec<Error>) {
        let ctx = Context::new(root);
        let mut events = Vec::new();
        let mut errors = Vec::new();
        let stream = reconcile_events(&ctx, catalog, mode, cancel);
        futures::pin_mut!(stream);
        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => events.push(event),
                Err(e) => errors.push(e),
            }
        }
        (events, errors)
    }

    fn summary(events: &[ReconcileEvent]) -> &Summary {
        match events.last() {
            Some(ReconcileEvent::Complete(summary)) => summary,
            other => panic!("expected completion, got {other:?}"),
        }
    }

    /// Two titles: a directory episode and a zip episode hiding behind `.cbr`.
    fn library() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        write_pages(&root.path().join("Alpha/Episode 2"), &["002.png", "001.jpg", "notes.txt"]);
        write_zip(&root.path().join("Alpha/Episode 1.cbr"), &[("p/002.webp", b"b"), ("p/001.jpg", b"a")]);
        write_pages(&root.path().join("Beta/Chapter 1"), &["a.jpeg"]);
        fs::write(root.path().join("README.txt"), b"not a title").unwrap();
        root
    }

    async fn titles_by_name(catalog: &Repository) -> Vec<(String, i64, bool)> {
        catalog.list_titles().await.unwrap().into_iter().map(|t| (t.name, t.id, t.available)).collect()
    }

    #[tokio::test]
    async fn test_event_order_and_first_index() {
        let root = library();
        let catalog = catalog().await;
        let (events, errors) = run(root.path(), &catalog, ScanMode::Regular).await;
        assert!(errors.is_empty(), "{errors:?}");

        assert_eq!(events[0], ReconcileEvent::Started { mode: ScanMode::Regular });
        assert_eq!(events[1], ReconcileEvent::DiscoveryComplete(2));
        assert_eq!(events[2], ReconcileEvent::TitleStarted { name: "Alpha".to_string() });
        assert!(matches!(&events[3], ReconcileEvent::TitleReconciled(r) if r.name == "Alpha" && r.created == 2));
        assert_eq!(events[4], ReconcileEvent::TitleStarted { name: "Beta".to_string() });
        assert_eq!(summary(&events).created, 3);

        let alpha = &catalog.list_titles().await.unwrap()[0];
        assert_eq!(alpha.root_path, root.path().join("Alpha"));
        let episodes = catalog.list_episodes(alpha.id).await.unwrap();
        assert_eq!(episodes.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(), ["Episode 1.cbr", "Episode 2"]);
        assert_eq!(episodes[0].source, EpisodeSource::Archive(ArchiveKind::Zip, root.path().join("Alpha/Episode 1.cbr")));
        assert_eq!(episodes[0].thumbnail.as_deref(), Some("p/001.jpg"));
        assert_eq!(episodes[1].thumbnail.as_deref(), Some("001.jpg"));

        let pages = catalog.list_pages(episodes[1].id).await.unwrap();
        assert_eq!(pages.iter().map(|p| p.filename.as_str()).collect::<Vec<_>>(), ["001.jpg", "002.png"]);
        assert_eq!(pages.iter().map(|p| p.position).collect::<Vec<_>>(), [0, 1]);
    }

    #[tokio::test]
    async fn test_rescan_keeps_ids() {
        let root = library();
        let catalog = catalog().await;
        run(root.path(), &catalog, ScanMode::Regular).await;
        let titles = titles_by_name(&catalog).await;
        let episodes = catalog.list_episodes(titles[0].1).await.unwrap();

        let (events, errors) = run(root.path(), &catalog, ScanMode::Regular).await;
        assert!(errors.is_empty());
        assert_eq!(summary(&events).created, 0);
        assert_eq!(summary(&events).skipped, 3);
        assert_eq!(titles_by_name(&catalog).await, titles);
        assert_eq!(catalog.list_episodes(titles[0].1).await.unwrap(), episodes);

        run(root.path(), &catalog, ScanMode::Thorough).await;
        assert_eq!(titles_by_name(&catalog).await, titles);
        let ids = |eps: Vec<toonshelf_catalog::Episode>| eps.into_iter().map(|e| e.id).collect::<Vec<_>>();
        assert_eq!(ids(catalog.list_episodes(titles[0].1).await.unwrap()), ids(episodes));
    }

    #[tokio::test]
    async fn test_regular_is_add_only_and_thorough_reindexes() {
        let root = library();
        let catalog = catalog().await;
        run(root.path(), &catalog, ScanMode::Regular).await;
        let beta = catalog.list_titles().await.unwrap().into_iter().find(|t| t.name == "Beta").unwrap();
        let episode = catalog.find_episode(beta.id, "Chapter 1").await.unwrap().unwrap();

        fs::write(root.path().join("Beta/Chapter 1/0.jpg"), b"cover").unwrap();
        write_pages(&root.path().join("Beta/Chapter 2"), &["x.png"]);

        let (events, _) = run(root.path(), &catalog, ScanMode::Regular).await;
        assert_eq!(summary(&events).created, 1);
        let pages = catalog.list_pages(episode.id).await.unwrap();
        assert_eq!(pages.iter().map(|p| p.filename.as_str()).collect::<Vec<_>>(), ["a.jpeg"]);

        let (events, _) = run(root.path(), &catalog, ScanMode::Thorough).await;
        assert_eq!(summary(&events).reindexed, 4);
        let pages = catalog.list_pages(episode.id).await.unwrap();
        assert_eq!(pages.iter().map(|p| p.filename.as_str()).collect::<Vec<_>>(), ["0.jpg", "a.jpeg"]);
        let episode = catalog.get_episode(episode.id).await.unwrap().unwrap();
        assert_eq!(episode.thumbnail.as_deref(), Some("0.jpg"));
        assert!(episode.indexed_at.is_some());
    }

    #[tokio::test]
    async fn test_thorough_updates_kind_in_place() {
        let root = library();
        let catalog = catalog().await;
        run(root.path(), &catalog, ScanMode::Regular).await;
        let alpha = catalog.list_titles().await.unwrap().into_iter().find(|t| t.name == "Alpha").unwrap();
        let before = catalog.find_episode(alpha.id, "Episode 1.cbr").await.unwrap().unwrap();
        assert_eq!(before.kind(), EpisodeKind::Zip);

        // Same name, now a (broken) rar: the kind changes and no pages survive.
        fs::write(root.path().join("Alpha/Episode 1.cbr"), b"Rar!\x1a\x07\x01\x00garbage").unwrap();
        run(root.path(), &catalog, ScanMode::Regular).await;
        assert_eq!(catalog.get_episode(before.id).await.unwrap().unwrap().kind(), EpisodeKind::Zip);

        let (_, errors) = run(root.path(), &catalog, ScanMode::Thorough).await;
        assert!(errors.is_empty(), "{errors:?}");
        let after = catalog.get_episode(before.id).await.unwrap().unwrap();
        assert_eq!(after.kind(), EpisodeKind::Rar);
        assert_eq!(after.thumbnail, None);
        assert!(catalog.list_pages(before.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_archive_indexes_as_empty() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("Gamma")).unwrap();
        fs::write(root.path().join("Gamma/Episode 1.cbz"), b"PK\x03\x04 truncated").unwrap();
        let catalog = catalog().await;

        let (events, errors) = run(root.path(), &catalog, ScanMode::Regular).await;
        assert!(errors.is_empty());
        assert_eq!(summary(&events).created, 1);
        let gamma = &catalog.list_titles().await.unwrap()[0];
        let episode = catalog.find_episode(gamma.id, "Episode 1.cbz").await.unwrap().unwrap();
        assert!(catalog.list_pages(episode.id).await.unwrap().is_empty());
        assert!(catalog.list_readable_titles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_availability_follows_disk() {
        let root = library();
        let catalog = catalog().await;
        run(root.path(), &catalog, ScanMode::Regular).await;
        let alpha = catalog.list_titles().await.unwrap().into_iter().find(|t| t.name == "Alpha").unwrap();
        let episode = catalog.find_episode(alpha.id, "Episode 2").await.unwrap().unwrap();
        let beta = catalog.list_titles().await.unwrap().into_iter().find(|t| t.name == "Beta").unwrap();
        let chapter = catalog.find_episode(beta.id, "Chapter 1").await.unwrap().unwrap();

        let parked = root.path().join(".parked");
        fs::rename(root.path().join("Alpha/Episode 2"), &parked).unwrap();
        fs::rename(root.path().join("Beta"), root.path().join(".Beta")).unwrap();
        let (events, _) = run(root.path(), &catalog, ScanMode::Regular).await;
        assert!(events.iter().any(|e| matches!(e, ReconcileEvent::TitleUnavailable { name, .. } if name == "Beta")));
        assert_eq!(summary(&events).unavailable, 1);
        assert_eq!(summary(&events).titles_unavailable, 1);
        let gone = catalog.get_episode(episode.id).await.unwrap().unwrap();
        assert!(!gone.available);
        assert!(catalog.list_pages(episode.id).await.unwrap().iter().all(|p| !p.available));
        assert!(!titles_by_name(&catalog).await.iter().any(|(name, _, available)| name == "Beta" && *available));
        // A vanished title takes its episodes and pages with it.
        assert!(!catalog.get_episode(chapter.id).await.unwrap().unwrap().available);
        assert!(catalog.list_pages(chapter.id).await.unwrap().iter().all(|p| !p.available));

        fs::rename(&parked, root.path().join("Alpha/Episode 2")).unwrap();
        fs::rename(root.path().join(".Beta"), root.path().join("Beta")).unwrap();
        let (events, _) = run(root.path(), &catalog, ScanMode::Regular).await;
        assert_eq!(summary(&events).restored, 2);
        for id in [episode.id, chapter.id] {
            assert!(catalog.get_episode(id).await.unwrap().unwrap().available);
            assert!(catalog.list_pages(id).await.unwrap().iter().all(|p| p.available));
        }
        assert!(titles_by_name(&catalog).await.iter().all(|(_, _, available)| *available));
    }

    #[tokio::test]
    async fn test_missing_root_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let catalog = catalog().await;
        let (events, errors) = run(&root.path().join("nope"), &catalog, ScanMode::Regular).await;
        assert_eq!(events, [ReconcileEvent::Started { mode: ScanMode::Regular }]);
        assert_eq!(errors.len(), 1);
        assert!(matches!(&*errors[0], ErrorKind::RootNotFound(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_title() {
        let root = library();
        let catalog = catalog().await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (events, _) = run_with(root.path(), &catalog, ScanMode::Thorough, &cancel).await;
        assert_eq!(
            events,
            [
                ReconcileEvent::Started { mode: ScanMode::Thorough },
                ReconcileEvent::DiscoveryComplete(2),
                ReconcileEvent::Cancelled,
            ]
        );
        assert!(catalog.list_titles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_public_stream_wraps_errors() {
        let root = tempfile::tempdir().unwrap();
        let catalog = catalog().await;
        let ctx = Context::new(root.path().join("nope"));
        let cancel = CancellationToken::new();
        let items: Vec<_> = reconcile(&ctx, &catalog, ScanMode::Regular, &cancel).collect().await;
        assert_eq!(items.len(), 2);
        let err = items[1].as_ref().unwrap_err();
        assert!(matches!(&**err, LibraryErrorKind::Reconcile));
    }
}
