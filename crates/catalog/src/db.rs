//! Database connection and pool management.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

/// Embedded migrations that are run automatically on connect.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
/// One writer (the scan) plus a handful of concurrent readers.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Database connection pool for the catalog.
///
/// This is the main entry point for interacting with the catalog database.
/// It manages the SQLite connection pool and hands out [`Repository`](crate::Repository)
/// instances via `From<&Database>`.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn new(options: SqliteConnectOptions, max: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // Apply the query-based PRAGMAs to every pooled connection, not
            // just the first one.
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .max_connections(max)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Connect to the catalog database at the given path with the default pool size.
    ///
    /// Creates the database file if it doesn't exist and runs migrations. The
    /// parent directory must already exist.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::connect_with(path, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Connect with an explicit upper bound on pooled connections.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn connect_with(path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let options = Self::base_options().filename(path.as_ref()).create_if_missing(true);
        Self::new(options, max_connections.max(1)).await
    }

    /// Connect to an in-memory database.
    ///
    /// Note:
    /// - In-memory databases are destroyed when the connection closes.
    /// - Deliberately not `#[cfg(test)]`: other crates use it in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        // Every pooled connection to ":memory:" would get its own private
        // database, so the pool must stay at exactly one connection.
        Self::new(options, 1).await
    }

    /// Base connection options shared between file and in-memory databases.
    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            // Readers (media requests, listings) never block the scan's writes.
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            // Replacing a large episode's pages holds the write lock for a
            // while; readers and the next writer wait rather than fail.
            .busy_timeout(std::time::Duration::from_millis(5000))
            .auto_vacuum(sqlx::sqlite::SqliteAutoVacuum::None)
    }

    /// Apply additional PRAGMA settings that aren't exposed via SqliteConnectOptions.
    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA wal_autocheckpoint = 800;
                PRAGMA cache_size = -8192;
                PRAGMA temp_store = MEMORY;
                PRAGMA analysis_limit = 1000;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Run database migrations.
    ///
    /// Called automatically by the `connect*` constructors.
    #[instrument("performing catalog migrations", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    ///
    /// Waits for all connections to be returned to the pool, then closes them.
    pub async fn close(&self) {
        // Let SQLite update query planner statistics.
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}
