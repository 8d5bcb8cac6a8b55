//! Combined repository for titles, episodes and pages.
//!
//! They're tightly coupled: pages only exist as part of an episode, and
//! episodes only as part of a title. Writes that touch more than one table
//! run in a transaction, so readers see either the old or the new state.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{
    EntityKind, Episode, EpisodeRow, EpisodeSource, NewEpisode, Page, PageRow, Title, TitleRow, checked_name,
    order_key_to_sql, path_to_sql,
};
use exn::{OptionExt, ResultExt};
use sqlx::SqlitePool;
use std::path::Path;
use time::UtcDateTime;

fn now() -> i64 {
    UtcDateTime::now().unix_timestamp()
}

/// Repository for the catalog's titles, episodes and pages.
///
/// # Identity
///
/// - Titles are keyed by name, episodes by (title, name). Upserts match on
///   those keys and never reassign an id.
/// - Pages are not individually stable: re-indexing an episode replaces its
///   whole page list.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Titles
    // =========================================================================

    /// Insert a title, or match the existing one by name.
    ///
    /// Either way the title ends up available with the given root path, and
    /// its id is returned. Calling this twice with the same name returns the
    /// same id.
    pub async fn upsert_title(&self, name: &str, root_path: impl AsRef<Path>) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(include_str!("../queries/upsert_title.sql"))
            .bind(checked_name(name)?)
            .bind(path_to_sql(root_path.as_ref(), "title root path")?)
            .bind(now())
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(id)
    }

    pub async fn get_title(&self, id: i64) -> Result<Option<Title>> {
        let row: Option<TitleRow> = sqlx::query_as(include_str!("../queries/get_title.sql"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Title::try_from).transpose()
    }

    /// Every title ever discovered, available or not, sorted by name.
    pub async fn list_titles(&self) -> Result<Vec<Title>> {
        let rows: Vec<TitleRow> = sqlx::query_as(include_str!("../queries/list_titles.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Title::try_from).collect()
    }

    /// Available titles that have at least one available episode with pages.
    ///
    /// This is what a reader's home screen shows: titles with nothing to read
    /// are left out.
    pub async fn list_readable_titles(&self) -> Result<Vec<Title>> {
        let rows: Vec<TitleRow> = sqlx::query_as(include_str!("../queries/list_readable_titles.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Title::try_from).collect()
    }

    // =========================================================================
    // Episodes
    // =========================================================================

    pub async fn find_episode(&self, title_id: i64, name: &str) -> Result<Option<Episode>> {
        let row: Option<EpisodeRow> = sqlx::query_as(include_str!("../queries/find_episode.sql"))
            .bind(title_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Episode::try_from).transpose()
    }

    pub async fn get_episode(&self, id: i64) -> Result<Option<Episode>> {
        let row: Option<EpisodeRow> = sqlx::query_as(include_str!("../queries/get_episode.sql"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Episode::try_from).transpose()
    }

    /// All episodes of a title, available or not, by order key then name.
    pub async fn list_episodes(&self, title_id: i64) -> Result<Vec<Episode>> {
        let rows: Vec<EpisodeRow> = sqlx::query_as(include_str!("../queries/list_episodes.sql"))
            .bind(title_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Episode::try_from).collect()
    }

    /// The available episodes immediately before and after `episode` in its
    /// title's reading order.
    pub async fn adjacent_episodes(&self, episode: &Episode) -> Result<(Option<Episode>, Option<Episode>)> {
        let order_key = order_key_to_sql(episode.order_key);
        let previous: Option<EpisodeRow> = sqlx::query_as(include_str!("../queries/previous_episode.sql"))
            .bind(episode.title_id)
            .bind(order_key)
            .bind(&episode.name)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let next: Option<EpisodeRow> = sqlx::query_as(include_str!("../queries/next_episode.sql"))
            .bind(episode.title_id)
            .bind(order_key)
            .bind(&episode.name)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok((previous.map(Episode::try_from).transpose()?, next.map(Episode::try_from).transpose()?))
    }

    /// Insert a newly discovered episode and return its id.
    ///
    /// If an episode with the same name already exists in the title, nothing
    /// is changed and the existing id is returned.
    pub async fn create_episode(&self, title_id: i64, episode: &NewEpisode) -> Result<i64> {
        let name = checked_name(&episode.name)?;
        let (source_path, archive_path) = episode.source.to_columns()?;
        let id: Option<i64> = sqlx::query_scalar(include_str!("../queries/create_episode.sql"))
            .bind(title_id)
            .bind(name)
            .bind(order_key_to_sql(episode.order_key))
            .bind(episode.source.kind().as_str())
            .bind(source_path)
            .bind(archive_path)
            .bind(now())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        match id {
            Some(id) => Ok(id),
            None => {
                let existing = self.find_episode(title_id, name).await?;
                Ok(existing.ok_or_raise(|| ErrorKind::Database)?.id)
            },
        }
    }

    /// Move an existing episode to a new location and/or kind, keeping its id.
    ///
    /// Also marks the episode available again.
    pub async fn update_episode_source(&self, id: i64, source: &EpisodeSource, order_key: u64) -> Result<()> {
        let (source_path, archive_path) = source.to_columns()?;
        let result = sqlx::query(include_str!("../queries/update_episode_source.sql"))
            .bind(source.kind().as_str())
            .bind(source_path)
            .bind(archive_path)
            .bind(order_key_to_sql(order_key))
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::EpisodeNotFound(id));
        }
        Ok(())
    }

    pub async fn set_thumbnail(&self, id: i64, thumbnail: Option<&str>) -> Result<()> {
        let result = sqlx::query(include_str!("../queries/set_thumbnail.sql"))
            .bind(thumbnail)
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::EpisodeNotFound(id));
        }
        Ok(())
    }

    // =========================================================================
    // Pages
    // =========================================================================

    /// Replace an episode's pages with `filenames`, in that order.
    ///
    /// Positions are assigned 0..n. The swap is atomic: concurrent readers
    /// see either the complete old list or the complete new one. Also stamps
    /// the episode's last-indexed time.
    pub async fn replace_images<S: AsRef<str>>(&self, episode_id: i64, filenames: &[S]) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let indexed = sqlx::query(include_str!("../queries/mark_indexed.sql"))
            .bind(now())
            .bind(episode_id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if indexed.rows_affected() == 0 {
            // Dropping the transaction rolls it back.
            exn::bail!(ErrorKind::EpisodeNotFound(episode_id));
        }
        sqlx::query(include_str!("../queries/delete_images.sql"))
            .bind(episode_id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        for (position, filename) in filenames.iter().enumerate() {
            let position = i64::try_from(position).or_raise(|| ErrorKind::InvalidData("page position"))?;
            sqlx::query(include_str!("../queries/insert_image.sql"))
                .bind(episode_id)
                .bind(filename.as_ref())
                .bind(position)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// An episode's pages, by position.
    pub async fn list_pages(&self, episode_id: i64) -> Result<Vec<Page>> {
        let rows: Vec<PageRow> = sqlx::query_as(include_str!("../queries/list_pages.sql"))
            .bind(episode_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Page::try_from).collect()
    }

    // =========================================================================
    // Availability
    // =========================================================================

    /// Flag an entity as (un)available. Returns `false` if no such entity exists.
    ///
    /// Episodes take their pages with them, in one transaction. A title being
    /// withdrawn takes every episode and page with it; restoring a title
    /// leaves its episodes alone, since some of them may really be gone.
    pub async fn set_availability(&self, kind: EntityKind, id: i64, available: bool) -> Result<bool> {
        let result = match kind {
            EntityKind::Title => {
                let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
                let result = sqlx::query(include_str!("../queries/set_title_availability.sql"))
                    .bind(available)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .or_raise(|| ErrorKind::Database)?;
                if !available {
                    // Pages first: they are found through the episodes' title.
                    sqlx::query(include_str!("../queries/withdraw_title_pages.sql"))
                        .bind(id)
                        .execute(&mut *tx)
                        .await
                        .or_raise(|| ErrorKind::Database)?;
                    sqlx::query(include_str!("../queries/withdraw_title_episodes.sql"))
                        .bind(id)
                        .execute(&mut *tx)
                        .await
                        .or_raise(|| ErrorKind::Database)?;
                }
                tx.commit().await.or_raise(|| ErrorKind::Database)?;
                result
            },
            EntityKind::Page => sqlx::query(include_str!("../queries/set_page_availability.sql"))
                .bind(available)
                .bind(id)
                .execute(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database)?,
            EntityKind::Episode => {
                let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
                let result = sqlx::query(include_str!("../queries/set_episode_availability.sql"))
                    .bind(available)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .or_raise(|| ErrorKind::Database)?;
                sqlx::query(include_str!("../queries/set_episode_pages_availability.sql"))
                    .bind(available)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .or_raise(|| ErrorKind::Database)?;
                tx.commit().await.or_raise(|| ErrorKind::Database)?;
                result
            },
        };
        Ok(result.rows_affected() > 0)
    }
}
