use crate::error::Error;
use crate::models::timestamp_from_sql;
use std::path::PathBuf;
use time::UtcDateTime;

/// A series: one directory directly under the library root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Title {
    pub id: i64,
    /// Directory name; unique across the catalog and the key used to match
    /// the title on later scans.
    pub name: String,
    pub root_path: PathBuf,
    pub available: bool,
    pub discovered_at: UtcDateTime,
}

#[derive(sqlx::FromRow)]
pub(crate) struct TitleRow {
    id: i64,
    name: String,
    root_path: String,
    available: bool,
    discovered_at: i64,
}
impl TryFrom<TitleRow> for Title {
    type Error = Error;
    fn try_from(row: TitleRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            root_path: PathBuf::from(row.root_path),
            available: row.available,
            discovered_at: timestamp_from_sql(row.discovered_at, "title discovery date")?,
        })
    }
}
