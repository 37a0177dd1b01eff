//! Database schema definitions
//!
//! The relational store owns identity, ownership, advisor assignment and the
//! review workflow. Invariants of the review workflow are also enforced by
//! CHECK constraints so a bad write fails at the database, not later at read.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_types::Integer;
use tracing::info;

use crate::error::StorageError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

#[derive(QueryableByName)]
struct VersionRow {
    #[diesel(sql_type = Integer)]
    version: i32,
}

/// Initialize the database schema
pub fn init_schema(conn: &mut SqliteConnection) -> Result<(), StorageError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        conn.batch_execute(LEDGER_SCHEMA)
            .map_err(|e| StorageError::Sql(format!("Failed to create tables: {}", e)))?;
        conn.batch_execute(INDEXES_SCHEMA)
            .map_err(|e| StorageError::Sql(format!("Failed to create indexes: {}", e)))?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Current schema version (0 if not initialized)
fn get_schema_version(conn: &mut SqliteConnection) -> Result<i32, StorageError> {
    conn.batch_execute("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .map_err(|e| StorageError::Sql(format!("Failed to create schema_version table: {}", e)))?;

    let row: Option<VersionRow> =
        diesel::sql_query("SELECT version FROM schema_version LIMIT 1")
            .get_result(conn)
            .optional()
            .map_err(|e| StorageError::Sql(format!("Failed to read schema_version: {}", e)))?;

    Ok(row.map(|r| r.version).unwrap_or(0))
}

fn set_schema_version(conn: &mut SqliteConnection, version: i32) -> Result<(), StorageError> {
    conn.batch_execute(&format!(
        "DELETE FROM schema_version; INSERT INTO schema_version (version) VALUES ({});",
        version
    ))
    .map_err(|e| StorageError::Sql(format!("Failed to set schema_version: {}", e)))
}

const LEDGER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY NOT NULL,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL,
    full_name TEXT NOT NULL,
    role TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS lecturers (
    id TEXT PRIMARY KEY NOT NULL REFERENCES users(id),
    lecturer_code TEXT NOT NULL UNIQUE,
    department TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS students (
    id TEXT PRIMARY KEY NOT NULL REFERENCES users(id),
    student_code TEXT NOT NULL UNIQUE,
    program_of_study TEXT NOT NULL,
    academic_year INTEGER NOT NULL,
    advisor_id TEXT REFERENCES lecturers(id),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS achievement_references (
    id TEXT PRIMARY KEY NOT NULL,
    student_id TEXT NOT NULL REFERENCES students(id),
    content_ref TEXT NOT NULL UNIQUE,
    status TEXT NOT NULL
        CHECK (status IN ('draft', 'submitted', 'verified', 'rejected', 'deleted')),
    submitted_at TEXT,
    verified_at TEXT,
    verified_by TEXT REFERENCES lecturers(id),
    rejection_note TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CHECK ((status = 'rejected') = (rejection_note IS NOT NULL)),
    CHECK ((verified_at IS NULL) = (verified_by IS NULL)),
    CHECK (status NOT IN ('verified', 'rejected') OR verified_at IS NOT NULL)
);
"#;

const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_refs_student ON achievement_references(student_id);
CREATE INDEX IF NOT EXISTS idx_refs_status ON achievement_references(status);
CREATE INDEX IF NOT EXISTS idx_refs_created ON achievement_references(created_at);
CREATE INDEX IF NOT EXISTS idx_students_advisor ON students(advisor_id);
"#;
