use crate::error::{Error, ErrorKind};
use exn::ResultExt;

/// One image of an episode, at a fixed zero-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub id: i64,
    pub episode_id: i64,
    /// Name inside the episode directory, or full path inside the archive.
    pub filename: String,
    pub position: u32,
    pub available: bool,
}

#[derive(sqlx::FromRow)]
pub(crate) struct PageRow {
    id: i64,
    episode_id: i64,
    filename: String,
    position: i64,
    available: bool,
}
impl TryFrom<PageRow> for Page {
    type Error = Error;
    fn try_from(row: PageRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            episode_id: row.episode_id,
            filename: row.filename,
            position: u32::try_from(row.position).or_raise(|| ErrorKind::InvalidData("page position"))?,
            available: row.available,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_position_is_rejected() {
        let row = PageRow { id: 1, episode_id: 1, filename: "001.jpg".to_string(), position: -1, available: true };
        let err = Page::try_from(row).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("page position")));
    }
}
