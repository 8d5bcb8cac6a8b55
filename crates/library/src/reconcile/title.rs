use crate::Context;
use crate::classify::{Candidate, classify};
use crate::reconcile::error::{Error, ErrorKind, Result};
use crate::reconcile::{ScanMode, TitleReport};
use exn::ResultExt;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use toonshelf_archive::list_images;
use toonshelf_catalog::{EntityKind, EpisodeSource, Repository, Title};
use toonshelf_storage::LocalBackend;
use toonshelf_storage::error::ErrorKind as StorageErrorKind;
use tracing::instrument;

/// A title directory found under the content root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TitleDir {
    pub(crate) name: String,
    pub(crate) path: PathBuf,
}

pub(crate) enum EpisodeOutcome {
    Created,
    Reindexed,
    Skipped,
    Restored,
}

/// Immediate subdirectories of the content root, sorted by name.
pub(crate) async fn discover_titles(root: &Path) -> Result<Vec<TitleDir>> {
    let library = match LocalBackend::open(root).await {
        Ok(library) => library,
        Err(err) => {
            let kind = match &*err {
                StorageErrorKind::NotFound(_) | StorageErrorKind::InvalidPath(_) => {
                    ErrorKind::RootNotFound(root.to_path_buf())
                },
                _ => ErrorKind::RootUnreadable(root.to_path_buf()),
            };
            return Err(err.raise(kind));
        },
    };
    let entries = library.list(None).await.or_raise(|| ErrorKind::RootUnreadable(root.to_path_buf()))?;
    Ok(entries
        .into_iter()
        .filter(|entry| entry.is_dir())
        .map(|entry| TitleDir { path: library.root().join(&entry.path), name: entry.name })
        .collect())
}

/// Flag every available catalog title that is no longer on disk, along with
/// its episodes and pages.
pub(crate) async fn mark_missing_titles(catalog: &Repository, present: &[TitleDir]) -> Result<Vec<Title>> {
    let present: HashSet<&str> = present.iter().map(|title| title.name.as_str()).collect();
    let mut missing = Vec::new();
    for title in catalog.list_titles().await.or_raise(|| ErrorKind::Catalog)? {
        if !title.available || present.contains(title.name.as_str()) {
            continue;
        }
        catalog.set_availability(EntityKind::Title, title.id, false).await.or_raise(|| ErrorKind::Catalog)?;
        tracing::info!(title = %title.name, "Title is no longer on disk; marking unavailable");
        missing.push(title);
    }
    Ok(missing)
}

/// Reconcile one title and every episode in it.
///
/// Never fails as a whole: each error is recorded in the report and handed
/// back for the caller to surface, and the title moves on to its next episode.
#[instrument(level = "debug", skip_all, fields(title = %title.name, %mode))]
pub(crate) async fn reconcile_title(
    ctx: &Context,
    catalog: &Repository,
    mode: ScanMode,
    cancel: &CancellationToken,
    title: &TitleDir,
) -> (TitleReport, Vec<Error>) {
    let mut report = TitleReport::new(&title.name);
    let mut errors = Vec::new();

    let title_id = match catalog.upsert_title(&title.name, &title.path).await.or_raise(|| ErrorKind::Catalog) {
        Ok(id) => id,
        Err(err) => {
            report.errors += 1;
            errors.push(err);
            return (report, errors);
        },
    };
    report.title_id = Some(title_id);

    // A title that cannot be listed keeps its episodes' flags as they are:
    // there is no way to tell which of them are gone.
    let candidates = match classify(&title.path).await.or_raise(|| ErrorKind::Filesystem) {
        Ok(candidates) => candidates,
        Err(err) => {
            report.errors += 1;
            errors.push(err);
            return (report, errors);
        },
    };

    for candidate in &candidates {
        if cancel.is_cancelled() {
            report.cancelled = true;
            return (report, errors);
        }
        match reconcile_episode(ctx, catalog, mode, title_id, candidate).await {
            Ok(EpisodeOutcome::Created) => report.created += 1,
            Ok(EpisodeOutcome::Reindexed) => report.reindexed += 1,
            Ok(EpisodeOutcome::Skipped) => report.skipped += 1,
            Ok(EpisodeOutcome::Restored) => report.restored += 1,
            Err(err) => {
                report.errors += 1;
                errors.push(err.raise(ErrorKind::Episode(candidate.name.clone())));
            },
        }
    }

    match mark_missing_episodes(catalog, title_id, &candidates).await {
        Ok(count) => report.unavailable = count,
        Err(err) => {
            report.errors += 1;
            errors.push(err);
        },
    }
    (report, errors)
}

async fn reconcile_episode(
    ctx: &Context,
    catalog: &Repository,
    mode: ScanMode,
    title_id: i64,
    candidate: &Candidate,
) -> Result<EpisodeOutcome> {
    let existing = catalog.find_episode(title_id, &candidate.name).await.or_raise(|| ErrorKind::Catalog)?;
    let Some(episode) = existing else {
        let episode_id =
            catalog.create_episode(title_id, &candidate.to_new_episode()).await.or_raise(|| ErrorKind::Catalog)?;
        index_episode(ctx, catalog, episode_id, &candidate.source).await?;
        return Ok(EpisodeOutcome::Created);
    };

    match mode {
        ScanMode::Regular if episode.available => Ok(EpisodeOutcome::Skipped),
        ScanMode::Regular => {
            catalog.set_availability(EntityKind::Episode, episode.id, true).await.or_raise(|| ErrorKind::Catalog)?;
            Ok(EpisodeOutcome::Restored)
        },
        ScanMode::Thorough => {
            if episode.source != candidate.source || episode.order_key != candidate.order_key {
                tracing::debug!(episode = %episode.name, kind = %candidate.source.kind(), "Episode source changed");
                catalog
                    .update_episode_source(episode.id, &candidate.source, candidate.order_key)
                    .await
                    .or_raise(|| ErrorKind::Catalog)?;
            } else if !episode.available {
                catalog.set_availability(EntityKind::Episode, episode.id, true).await.or_raise(|| ErrorKind::Catalog)?;
            }
            index_episode(ctx, catalog, episode.id, &candidate.source).await?;
            Ok(EpisodeOutcome::Reindexed)
        },
    }
}

/// Rebuild the page list and thumbnail of an episode from its source.
///
/// Archives that cannot be read index as zero pages.
async fn index_episode(ctx: &Context, catalog: &Repository, episode_id: i64, source: &EpisodeSource) -> Result<usize> {
    let images = match source {
        EpisodeSource::Directory(path) => {
            let episode = LocalBackend::open(path).await.or_raise(|| ErrorKind::Filesystem)?;
            episode.list_images(None).await.or_raise(|| ErrorKind::Filesystem)?
        },
        EpisodeSource::Archive(kind, path) => list_images(*kind, path, ctx.archive_open_timeout()).await,
    };
    catalog.replace_images(episode_id, &images).await.or_raise(|| ErrorKind::Catalog)?;
    catalog
        .set_thumbnail(episode_id, images.first().map(String::as_str))
        .await
        .or_raise(|| ErrorKind::Catalog)?;
    tracing::debug!(episode_id, pages = images.len(), "Indexed episode");
    Ok(images.len())
}

async fn mark_missing_episodes(catalog: &Repository, title_id: i64, candidates: &[Candidate]) -> Result<u64> {
    let present: HashSet<&str> = candidates.iter().map(|candidate| candidate.name.as_str()).collect();
    let mut count = 0;
    for episode in catalog.list_episodes(title_id).await.or_raise(|| ErrorKind::Catalog)? {
        if !episode.available || present.contains(episode.name.as_str()) {
            continue;
        }
        catalog.set_availability(EntityKind::Episode, episode.id, false).await.or_raise(|| ErrorKind::Catalog)?;
        tracing::info!(episode = %episode.name, "Episode is no longer on disk; marking unavailable");
        count += 1;
    }
    Ok(count)
}
