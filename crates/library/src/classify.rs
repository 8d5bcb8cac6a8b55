//! Episode discovery inside a single title directory.

use crate::order::extract_number;
use std::path::{Path, PathBuf};
use toonshelf_archive::{ArchiveKind, MAGIC_LEN};
use toonshelf_catalog::{EpisodeSource, NewEpisode};
use toonshelf_storage::LocalBackend;
use toonshelf_storage::error::Result as StorageResult;
use tracing::instrument;

/// A directory or archive that looks like an episode, not yet in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub source: EpisodeSource,
    pub order_key: u64,
}
impl Candidate {
    fn new(name: String, source: EpisodeSource) -> Self {
        let order_key = extract_number(&name);
        Self { name, source, order_key }
    }

    pub fn to_new_episode(&self) -> NewEpisode {
        NewEpisode { name: self.name.clone(), source: self.source.clone(), order_key: self.order_key }
    }
}

/// List the episodes of the title at `title_path`, in reading order.
///
/// Subdirectories are directory episodes. Regular files are archive episodes
/// only if their leading bytes carry a zip or rar signature; the file name
/// suffix is ignored, so a `.cbr` that is really a zip comes back as zip.
/// Anything else is skipped with a warning.
///
/// Ordering is directories, then zips, then rars (each by name), then a
/// stable sort on [`extract_number`], so equal keys keep that order.
///
/// # Errors
///
/// Fails only if the title directory itself cannot be opened or listed.
#[instrument(level = "debug", skip(title_path), fields(title = %title_path.as_ref().display()))]
pub async fn classify(title_path: impl AsRef<Path>) -> StorageResult<Vec<Candidate>> {
    let title = LocalBackend::open(title_path).await?;
    let mut directories = Vec::new();
    let mut zips = Vec::new();
    let mut rars = Vec::new();
    for entry in title.list(None).await? {
        let path: PathBuf = title.root().join(&entry.path);
        if entry.is_dir() {
            directories.push(Candidate::new(entry.name, EpisodeSource::Directory(path)));
            continue;
        }
        let head = match title.read_head(&entry.path, MAGIC_LEN).await {
            Ok(head) => head,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = ?err, "Skipping unreadable file");
                continue;
            },
        };
        match ArchiveKind::from_magic_bytes(&head) {
            Some(kind @ ArchiveKind::Zip) => zips.push(Candidate::new(entry.name, EpisodeSource::Archive(kind, path))),
            Some(kind @ ArchiveKind::Rar) => rars.push(Candidate::new(entry.name, EpisodeSource::Archive(kind, path))),
            None => tracing::warn!(path = %path.display(), "Skipping file that is neither a zip nor a rar archive"),
        }
    }

    let mut candidates: Vec<Candidate> = directories.into_iter().chain(zips).chain(rars).collect();
    candidates.sort_by_key(|candidate| candidate.order_key);
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{write_pages, write_zip};
    use std::fs;
    use toonshelf_catalog::EpisodeKind;

    fn summary(candidates: &[Candidate]) -> Vec<(&str, EpisodeKind, u64)> {
        candidates.iter().map(|c| (c.name.as_str(), c.source.kind(), c.order_key)).collect()
    }

    #[tokio::test]
    async fn test_orders_by_number_then_kind() {
        let dir = tempfile::tempdir().unwrap();
        write_pages(&dir.path().join("Episode 10"), &["001.jpg"]);
        write_pages(&dir.path().join("Episode 2"), &["001.jpg"]);
        write_zip(&dir.path().join("Episode 1.cbz"), &[("001.jpg", b"a")]);
        fs::write(dir.path().join("Episode 1.cbr"), b"Rar!\x1a\x07\x01\x00rest").unwrap();
        write_pages(&dir.path().join("Episode 1"), &["001.jpg"]);

        let candidates = classify(dir.path()).await.unwrap();
        assert_eq!(
            summary(&candidates),
            [
                ("Episode 1", EpisodeKind::Directory, 1),
                ("Episode 1.cbz", EpisodeKind::Zip, 1),
                ("Episode 1.cbr", EpisodeKind::Rar, 1),
                ("Episode 2", EpisodeKind::Directory, 2),
                ("Episode 10", EpisodeKind::Directory, 10),
            ]
        );
    }

    #[tokio::test]
    async fn test_kind_comes_from_content_not_suffix() {
        let dir = tempfile::tempdir().unwrap();
        write_zip(&dir.path().join("Chapter 3.cbr"), &[("p1.png", b"a")]);
        fs::write(dir.path().join("Chapter 4.cbz"), b"Rar!\x1a\x07\x00").unwrap();

        let candidates = classify(dir.path()).await.unwrap();
        assert_eq!(
            summary(&candidates),
            [("Chapter 3.cbr", EpisodeKind::Zip, 3), ("Chapter 4.cbz", EpisodeKind::Rar, 4)]
        );
        let EpisodeSource::Archive(_, path) = &candidates[0].source else {
            panic!("expected an archive source");
        };
        assert_eq!(path, &dir.path().join("Chapter 3.cbr"));
    }

    #[tokio::test]
    async fn test_skips_unrecognised_and_hidden_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), b"not an episode").unwrap();
        fs::write(dir.path().join("empty.cbz"), b"").unwrap();
        fs::write(dir.path().join("cover.jpg"), b"\xff\xd8\xff\xe0").unwrap();
        write_pages(&dir.path().join(".thumbnails"), &["001.jpg"]);
        write_pages(&dir.path().join("Prologue"), &[]);

        let candidates = classify(dir.path()).await.unwrap();
        assert_eq!(summary(&candidates), [("Prologue", EpisodeKind::Directory, 0)]);
    }

    #[tokio::test]
    async fn test_missing_title_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = classify(dir.path().join("gone")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_to_new_episode() {
        let candidate = Candidate::new("Ep 5".to_string(), EpisodeSource::Directory(PathBuf::from("/lib/A/Ep 5")));
        let episode = candidate.to_new_episode();
        assert_eq!(episode.name, "Ep 5");
        assert_eq!(episode.order_key, 5);
        assert_eq!(episode.source, candidate.source);
    }
}
