//! SQLite relational store
//!
//! Holds users, student and lecturer profiles, advisor assignment and the
//! achievement references that drive the review workflow.
//!
//! ## Tables
//!
//! - `users` - accounts (id, username, role, active flag)
//! - `students` / `lecturers` - profiles keyed by the user id
//! - `achievement_references` - one row per achievement, pointing at the
//!   content document by `content_ref`
//!
//! Every store operation checks out exactly one pooled connection and passes
//! `&mut SqliteConnection` down to helpers, so a pool of size one never
//! deadlocks against itself.

pub mod diesel_schema;
pub mod models;
pub mod profiles;
pub mod references;
pub mod schema;

use std::path::Path;
use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::StorageError;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type PooledConn = PooledConnection<ConnectionManager<SqliteConnection>>;

pub use models::{Lecturer, Student, User};
pub use profiles::{
    IdentityDirectory, NewProfile, ProfileLookup, SqliteProfileStore, StudentRoster,
};
pub use references::{
    AchievementReference, NewReference, Pagination, ReferenceFilter, ReferenceStore,
    SqliteReferenceStore, StatusTransition,
};

/// Per-connection PRAGMAs applied when the pool opens a connection
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    busy_timeout_ms: u64,
    wal: bool,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        let journal = if self.wal { "PRAGMA journal_mode = WAL;" } else { "" };
        // busy_timeout first so the journal switch waits on a locked file
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {}; {} PRAGMA synchronous = NORMAL; PRAGMA foreign_keys = ON;",
            self.busy_timeout_ms, journal
        ))
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

pub(crate) fn checkout(pool: &DbPool) -> Result<PooledConn, StorageError> {
    pool.get()
        .map_err(|e| StorageError::Pool(format!("Failed to get connection: {}", e)))
}

pub(crate) fn sql_err(context: &str) -> impl Fn(diesel::result::Error) -> StorageError + '_ {
    move |e| StorageError::Sql(format!("{}: {}", context, e))
}

/// Connection pool plus schema bootstrap
#[derive(Clone)]
pub struct RelationalDb {
    pool: DbPool,
}

impl RelationalDb {
    /// Open or create the database file
    pub fn open(db_path: &Path, pool_size: u32, busy_timeout_ms: u64) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        info!("Opening SQLite database at {:?}", db_path);

        let manager = ConnectionManager::<SqliteConnection>::new(db_path.to_string_lossy());
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .connection_timeout(Duration::from_millis(busy_timeout_ms.max(1000)))
            .connection_customizer(Box::new(ConnectionOptions {
                busy_timeout_ms,
                wal: true,
            }))
            .build(manager)
            .map_err(|e| StorageError::Pool(format!("Failed to build pool: {}", e)))?;

        Self::bootstrap(pool)
    }

    /// In-memory database (tests). Single connection so every caller sees
    /// the same database.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        debug!("Opening in-memory SQLite database");

        let manager = ConnectionManager::<SqliteConnection>::new(":memory:");
        let pool = Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connection_customizer(Box::new(ConnectionOptions {
                busy_timeout_ms: 5000,
                wal: false,
            }))
            .build(manager)
            .map_err(|e| StorageError::Pool(format!("Failed to build pool: {}", e)))?;

        Self::bootstrap(pool)
    }

    fn bootstrap(pool: DbPool) -> Result<Self, StorageError> {
        {
            let mut conn = checkout(&pool)?;
            schema::init_schema(&mut conn)?;
        }
        Ok(Self { pool })
    }

    pub fn pool(&self) -> DbPool {
        self.pool.clone()
    }

    /// Row counts for the CLI `init` summary
    pub fn stats(&self) -> Result<DbStats, StorageError> {
        use diesel_schema::{achievement_references, lecturers, students, users};

        let mut conn = checkout(&self.pool)?;
        let conn = &mut *conn;

        let user_count: i64 = users::table
            .count()
            .get_result(conn)
            .map_err(sql_err("Count users"))?;
        let student_count: i64 = students::table
            .count()
            .get_result(conn)
            .map_err(sql_err("Count students"))?;
        let lecturer_count: i64 = lecturers::table
            .count()
            .get_result(conn)
            .map_err(sql_err("Count lecturers"))?;
        let reference_count: i64 = achievement_references::table
            .count()
            .get_result(conn)
            .map_err(sql_err("Count references"))?;

        Ok(DbStats {
            user_count: user_count as u64,
            student_count: student_count as u64,
            lecturer_count: lecturer_count as u64,
            reference_count: reference_count as u64,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbStats {
    pub user_count: u64,
    pub student_count: u64,
    pub lecturer_count: u64,
    pub reference_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_file_db_and_stats() {
        let temp_dir = TempDir::new().unwrap();
        let db = RelationalDb::open(&temp_dir.path().join("ledger.db"), 2, 5000).unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats.user_count, 0);
        assert_eq!(stats.reference_count, 0);

        // Reopen runs the version check instead of recreating tables
        drop(db);
        let db = RelationalDb::open(&temp_dir.path().join("ledger.db"), 2, 5000).unwrap();
        assert_eq!(db.stats().unwrap().student_count, 0);
    }
}
