//! Diesel model definitions for database tables
//!
//! - Queryable structs: for SELECT queries (reading data)
//! - Insertable structs: for INSERT queries (writing data)
//!
//! Timestamps are TEXT columns in a fixed-width UTC format, so lexical order
//! equals chronological order.

use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::diesel_schema::*;
use crate::error::StorageError;

// ============================================================================
// Timestamp Helpers (SQLite stores timestamps as TEXT)
// ============================================================================

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Current UTC timestamp as a string for SQLite TEXT columns
pub fn current_timestamp() -> String {
    format_timestamp(&Utc::now())
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)))
        .map_err(|e| StorageError::Corrupt(format!("bad timestamp '{}': {}", raw, e)))
}

// ============================================================================
// Achievement References
// ============================================================================

/// Achievement reference row from SELECT query
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = achievement_references)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ReferenceRow {
    pub id: String,
    pub student_id: String,
    pub content_ref: String,
    pub status: String,
    pub submitted_at: Option<String>,
    pub verified_at: Option<String>,
    pub verified_by: Option<String>,
    pub rejection_note: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// New reference for INSERT (always starts as draft)
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = achievement_references)]
pub struct NewReferenceRow<'a> {
    pub id: &'a str,
    pub student_id: &'a str,
    pub content_ref: &'a str,
    pub status: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

// ============================================================================
// Profiles
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub is_active: i32,
    pub created_at: String,
}

impl User {
    pub fn active(&self) -> bool {
        self.is_active != 0
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub full_name: &'a str,
    pub role: &'a str,
    pub is_active: i32,
    pub created_at: &'a str,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = students)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub student_code: String,
    pub program_of_study: String,
    pub academic_year: i32,
    pub advisor_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = students)]
pub struct NewStudent<'a> {
    pub id: &'a str,
    pub student_code: &'a str,
    pub program_of_study: &'a str,
    pub academic_year: i32,
    pub advisor_id: Option<&'a str>,
    pub created_at: &'a str,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = lecturers)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct Lecturer {
    pub id: String,
    pub lecturer_code: String,
    pub department: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = lecturers)]
pub struct NewLecturer<'a> {
    pub id: &'a str,
    pub lecturer_code: &'a str,
    pub department: &'a str,
    pub created_at: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_format_roundtrips_and_sorts() {
        let now = Utc::now();
        let raw = format_timestamp(&now);
        let parsed = parse_timestamp(&raw).unwrap();
        assert_eq!(format_timestamp(&parsed), raw);

        let earlier = format_timestamp(&(now - chrono::Duration::seconds(5)));
        assert!(earlier < raw);
    }

    #[test]
    fn test_parse_accepts_rfc3339() {
        let parsed = parse_timestamp("2024-03-01T10:00:00+00:00").unwrap();
        assert_eq!(format_timestamp(&parsed), "2024-03-01T10:00:00.000Z");
        assert!(parse_timestamp("yesterday").is_err());
    }
}
