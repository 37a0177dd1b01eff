//! Achievement references - the review workflow records
//!
//! The reference row is authoritative for status. Every status change goes
//! through [`ReferenceStore::update_status_atomic`], a single conditional
//! `UPDATE ... WHERE id = ? AND status = ?`, so two reviewers racing on the
//! same record produce exactly one winner.
//!
//! Visibility filters are compiled into SQL: every list/count query joins
//! `students` so that `AdviseesOf` is a plain `students.advisor_id = ?`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::Sqlite;
use serde::Serialize;
use tracing::{debug, info};

use super::diesel_schema::{achievement_references, students};
use super::models::{format_timestamp, parse_timestamp, NewReferenceRow, ReferenceRow};
use super::{checkout, sql_err, DbPool};
use crate::error::StorageError;
use crate::model::AchievementStatus;
use crate::scope::ScopePredicate;

// ============================================================================
// Domain types
// ============================================================================

/// Lifecycle record for one achievement
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementReference {
    pub id: String,
    pub student_id: String,
    pub content_ref: String,
    pub status: AchievementStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<String>,
    pub rejection_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn parse_optional(raw: Option<String>) -> Result<Option<DateTime<Utc>>, StorageError> {
    raw.as_deref().map(parse_timestamp).transpose()
}

impl TryFrom<ReferenceRow> for AchievementReference {
    type Error = StorageError;

    fn try_from(row: ReferenceRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<AchievementStatus>()
            .map_err(|e| StorageError::Corrupt(format!("reference {}: {}", row.id, e)))?;

        Ok(Self {
            status,
            submitted_at: parse_optional(row.submitted_at)?,
            verified_at: parse_optional(row.verified_at)?,
            verified_by: row.verified_by,
            rejection_note: row.rejection_note,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            id: row.id,
            student_id: row.student_id,
            content_ref: row.content_ref,
        })
    }
}

/// Input for inserting a new (draft) reference
#[derive(Debug, Clone)]
pub struct NewReference {
    pub id: String,
    pub student_id: String,
    pub content_ref: String,
}

/// Column changes carried by a status CAS
#[derive(Debug, Clone, PartialEq)]
pub enum StatusTransition {
    Submit {
        at: DateTime<Utc>,
    },
    /// Clears any rejection note
    Verify {
        by: String,
        at: DateTime<Utc>,
    },
    Reject {
        by: String,
        at: DateTime<Utc>,
        note: String,
    },
    Delete,
}

impl StatusTransition {
    pub fn target(&self) -> AchievementStatus {
        match self {
            StatusTransition::Submit { .. } => AchievementStatus::Submitted,
            StatusTransition::Verify { .. } => AchievementStatus::Verified,
            StatusTransition::Reject { .. } => AchievementStatus::Rejected,
            StatusTransition::Delete => AchievementStatus::Deleted,
        }
    }
}

/// Filter for list/count queries
#[derive(Debug, Clone)]
pub struct ReferenceFilter {
    pub scope: ScopePredicate,
    pub status: Option<AchievementStatus>,
    pub student_id: Option<String>,
    pub exclude_deleted: bool,
}

impl ReferenceFilter {
    /// Everything visible under `scope`, deleted rows excluded
    pub fn visible(scope: ScopePredicate) -> Self {
        Self {
            scope,
            status: None,
            student_id: None,
            exclude_deleted: true,
        }
    }

    pub fn with_status(mut self, status: AchievementStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn for_student(mut self, student_id: impl Into<String>) -> Self {
        self.student_id = Some(student_id.into());
        self
    }
}

/// Page request, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page, limit }
    }

    /// Clamp to `page >= 1` and `1 <= limit <= max_limit`; a zero limit
    /// falls back to `default_limit`.
    pub fn normalized(self, default_limit: u32, max_limit: u32) -> Self {
        let limit = match self.limit {
            0 => default_limit,
            n => n,
        };
        Self {
            page: self.page.max(1),
            limit: limit.clamp(1, max_limit.max(1)),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.limit as i64
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

// ============================================================================
// Store contract
// ============================================================================

pub trait ReferenceStore: Send + Sync {
    fn create(&self, reference: NewReference) -> Result<AchievementReference, StorageError>;

    fn get_by_id(&self, id: &str) -> Result<Option<AchievementReference>, StorageError>;

    fn get_by_content_ref(
        &self,
        content_ref: &str,
    ) -> Result<Option<AchievementReference>, StorageError>;

    /// Apply `transition` only if the row is still in `expected`.
    ///
    /// `NotFound` if the row is missing, `Conflict` if its status moved.
    fn update_status_atomic(
        &self,
        id: &str,
        expected: AchievementStatus,
        transition: StatusTransition,
    ) -> Result<AchievementReference, StorageError>;

    /// CAS `draft -> deleted`; the row is retained
    fn soft_delete(&self, id: &str) -> Result<AchievementReference, StorageError>;

    /// Bump `updated_at` while the row is still in `expected`
    fn touch(
        &self,
        id: &str,
        expected: AchievementStatus,
    ) -> Result<AchievementReference, StorageError>;

    fn list(
        &self,
        filter: &ReferenceFilter,
        page: Pagination,
    ) -> Result<Vec<AchievementReference>, StorageError>;

    fn count(&self, filter: &ReferenceFilter) -> Result<u64, StorageError>;

    /// Every matching reference, newest first, unpaged
    fn list_all(&self, filter: &ReferenceFilter) -> Result<Vec<AchievementReference>, StorageError>;

    /// Count per status; statuses with no rows are absent
    fn count_by_status(
        &self,
        filter: &ReferenceFilter,
    ) -> Result<BTreeMap<AchievementStatus, u64>, StorageError>;

    /// Verified counts bucketed `YYYY-MM` by verification time, most recent
    /// first, at most `limit` buckets
    fn verified_by_period(
        &self,
        filter: &ReferenceFilter,
        limit: usize,
    ) -> Result<Vec<(String, u64)>, StorageError>;
}

// ============================================================================
// SQLite implementation
// ============================================================================

type BoxedRefQuery = diesel::dsl::IntoBoxed<
    'static,
    diesel::dsl::InnerJoin<achievement_references::table, students::table>,
    Sqlite,
>;

/// Compile a filter into a boxed join query
fn filtered(filter: &ReferenceFilter) -> BoxedRefQuery {
    let mut query = achievement_references::table
        .inner_join(students::table)
        .into_boxed();

    match &filter.scope {
        ScopePredicate::OwnOnly(student_id) => {
            query = query.filter(achievement_references::student_id.eq(student_id.clone()));
        }
        ScopePredicate::AdviseesOf(lecturer_id) => {
            query = query.filter(students::advisor_id.eq(lecturer_id.clone()));
        }
        ScopePredicate::Unrestricted => {}
    }

    if let Some(status) = filter.status {
        query = query.filter(achievement_references::status.eq(status.as_str()));
    }
    if let Some(student_id) = &filter.student_id {
        query = query.filter(achievement_references::student_id.eq(student_id.clone()));
    }
    if filter.exclude_deleted {
        query = query.filter(
            achievement_references::status.ne(AchievementStatus::Deleted.as_str()),
        );
    }

    query
}

fn load_one(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<AchievementReference>, StorageError> {
    achievement_references::table
        .find(id)
        .select(ReferenceRow::as_select())
        .first(conn)
        .optional()
        .map_err(sql_err("Reference query failed"))?
        .map(AchievementReference::try_from)
        .transpose()
}

/// Reference store over the shared SQLite pool
#[derive(Clone)]
pub struct SqliteReferenceStore {
    pool: DbPool,
}

impl SqliteReferenceStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl ReferenceStore for SqliteReferenceStore {
    fn create(&self, reference: NewReference) -> Result<AchievementReference, StorageError> {
        let mut conn = checkout(&self.pool)?;
        let now = format_timestamp(&Utc::now());

        diesel::insert_into(achievement_references::table)
            .values(NewReferenceRow {
                id: &reference.id,
                student_id: &reference.student_id,
                content_ref: &reference.content_ref,
                status: AchievementStatus::Draft.as_str(),
                created_at: &now,
                updated_at: &now,
            })
            .execute(&mut conn)
            .map_err(sql_err("Insert reference failed"))?;

        info!(id = %reference.id, student_id = %reference.student_id, "Reference created");

        load_one(&mut conn, &reference.id)?
            .ok_or_else(|| StorageError::NotFound(format!("reference {}", reference.id)))
    }

    fn get_by_id(&self, id: &str) -> Result<Option<AchievementReference>, StorageError> {
        let mut conn = checkout(&self.pool)?;
        load_one(&mut conn, id)
    }

    fn get_by_content_ref(
        &self,
        content_ref: &str,
    ) -> Result<Option<AchievementReference>, StorageError> {
        let mut conn = checkout(&self.pool)?;
        achievement_references::table
            .filter(achievement_references::content_ref.eq(content_ref))
            .select(ReferenceRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(sql_err("Reference query failed"))?
            .map(AchievementReference::try_from)
            .transpose()
    }

    fn update_status_atomic(
        &self,
        id: &str,
        expected: AchievementStatus,
        transition: StatusTransition,
    ) -> Result<AchievementReference, StorageError> {
        use achievement_references::dsl as r;

        let mut conn = checkout(&self.pool)?;
        let now = format_timestamp(&Utc::now());
        let target = transition.target().as_str();

        let updated = conn.immediate_transaction::<_, StorageError, _>(|conn| {
            let guarded = r::achievement_references
                .filter(r::id.eq(id))
                .filter(r::status.eq(expected.as_str()));

            let affected = match &transition {
                StatusTransition::Submit { at } => diesel::update(guarded)
                    .set((
                        r::status.eq(target),
                        r::submitted_at.eq(Some(format_timestamp(at))),
                        r::updated_at.eq(&now),
                    ))
                    .execute(conn)?,
                StatusTransition::Verify { by, at } => diesel::update(guarded)
                    .set((
                        r::status.eq(target),
                        r::verified_at.eq(Some(format_timestamp(at))),
                        r::verified_by.eq(Some(by.as_str())),
                        r::rejection_note.eq(None::<String>),
                        r::updated_at.eq(&now),
                    ))
                    .execute(conn)?,
                StatusTransition::Reject { by, at, note } => diesel::update(guarded)
                    .set((
                        r::status.eq(target),
                        r::verified_at.eq(Some(format_timestamp(at))),
                        r::verified_by.eq(Some(by.as_str())),
                        r::rejection_note.eq(Some(note.as_str())),
                        r::updated_at.eq(&now),
                    ))
                    .execute(conn)?,
                StatusTransition::Delete => diesel::update(guarded)
                    .set((r::status.eq(target), r::updated_at.eq(&now)))
                    .execute(conn)?,
            };

            if affected == 0 {
                let actual: Option<String> = r::achievement_references
                    .find(id)
                    .select(r::status)
                    .first(conn)
                    .optional()?;
                return Err(match actual {
                    None => StorageError::NotFound(format!("reference {}", id)),
                    Some(actual) => StorageError::Conflict(format!(
                        "reference {} is {}, expected {}",
                        id, actual, expected
                    )),
                });
            }

            load_one(conn, id)?
                .ok_or_else(|| StorageError::NotFound(format!("reference {}", id)))
        })?;

        info!(id = %id, from = %expected, to = %updated.status, "Reference status changed");
        Ok(updated)
    }

    fn soft_delete(&self, id: &str) -> Result<AchievementReference, StorageError> {
        self.update_status_atomic(id, AchievementStatus::Draft, StatusTransition::Delete)
    }

    fn touch(
        &self,
        id: &str,
        expected: AchievementStatus,
    ) -> Result<AchievementReference, StorageError> {
        use achievement_references::dsl as r;

        let mut conn = checkout(&self.pool)?;
        let now = format_timestamp(&Utc::now());

        conn.immediate_transaction::<_, StorageError, _>(|conn| {
            let affected = diesel::update(
                r::achievement_references
                    .filter(r::id.eq(id))
                    .filter(r::status.eq(expected.as_str())),
            )
            .set(r::updated_at.eq(&now))
            .execute(conn)?;

            if affected == 0 {
                return Err(match load_one(conn, id)? {
                    None => StorageError::NotFound(format!("reference {}", id)),
                    Some(current) => StorageError::Conflict(format!(
                        "reference {} is {}, expected {}",
                        id, current.status, expected
                    )),
                });
            }

            debug!(id = %id, "Reference touched");
            load_one(conn, id)?
                .ok_or_else(|| StorageError::NotFound(format!("reference {}", id)))
        })
    }

    fn list(
        &self,
        filter: &ReferenceFilter,
        page: Pagination,
    ) -> Result<Vec<AchievementReference>, StorageError> {
        let mut conn = checkout(&self.pool)?;
        let rows: Vec<ReferenceRow> = filtered(filter)
            .select(ReferenceRow::as_select())
            .order((
                achievement_references::created_at.desc(),
                achievement_references::id.desc(),
            ))
            .limit(page.limit as i64)
            .offset(page.offset())
            .load(&mut conn)
            .map_err(sql_err("List references failed"))?;

        rows.into_iter().map(AchievementReference::try_from).collect()
    }

    fn count(&self, filter: &ReferenceFilter) -> Result<u64, StorageError> {
        let mut conn = checkout(&self.pool)?;
        let total: i64 = filtered(filter)
            .count()
            .get_result(&mut conn)
            .map_err(sql_err("Count references failed"))?;
        Ok(total as u64)
    }

    fn list_all(&self, filter: &ReferenceFilter) -> Result<Vec<AchievementReference>, StorageError> {
        let mut conn = checkout(&self.pool)?;
        let rows: Vec<ReferenceRow> = filtered(filter)
            .select(ReferenceRow::as_select())
            .order((
                achievement_references::created_at.desc(),
                achievement_references::id.desc(),
            ))
            .load(&mut conn)
            .map_err(sql_err("List references failed"))?;

        rows.into_iter().map(AchievementReference::try_from).collect()
    }

    fn count_by_status(
        &self,
        filter: &ReferenceFilter,
    ) -> Result<BTreeMap<AchievementStatus, u64>, StorageError> {
        let mut conn = checkout(&self.pool)?;
        let rows: Vec<(String, i64)> = filtered(filter)
            .group_by(achievement_references::status)
            .select((achievement_references::status, diesel::dsl::count_star()))
            .load(&mut conn)
            .map_err(sql_err("Status breakdown failed"))?;

        rows.into_iter()
            .map(|(raw, count)| {
                let status = raw
                    .parse::<AchievementStatus>()
                    .map_err(|e| StorageError::Corrupt(e.to_string()))?;
                Ok((status, count as u64))
            })
            .collect()
    }

    fn verified_by_period(
        &self,
        filter: &ReferenceFilter,
        limit: usize,
    ) -> Result<Vec<(String, u64)>, StorageError> {
        let filter = filter.clone().with_status(AchievementStatus::Verified);

        let mut conn = checkout(&self.pool)?;
        let stamps: Vec<Option<String>> = filtered(&filter)
            .select(achievement_references::verified_at)
            .load(&mut conn)
            .map_err(sql_err("Period breakdown failed"))?;

        let mut buckets: BTreeMap<String, u64> = BTreeMap::new();
        for raw in stamps.into_iter().flatten() {
            let at = parse_timestamp(&raw)?;
            *buckets.entry(at.format("%Y-%m").to_string()).or_insert(0) += 1;
        }

        Ok(buckets.into_iter().rev().take(limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::profiles::{NewProfile, SqliteProfileStore};
    use crate::db::RelationalDb;

    fn setup() -> (SqliteReferenceStore, SqliteProfileStore) {
        let db = RelationalDb::open_in_memory().unwrap();
        let profiles = SqliteProfileStore::new(db.pool());
        profiles
            .create_lecturer(NewProfile::new("lec-1", "Dr. Lee"), "L-01", "Informatics")
            .unwrap();
        profiles
            .create_student(NewProfile::new("stu-1", "Ana"), "S-001", "Informatics", 2022, Some("lec-1"))
            .unwrap();
        profiles
            .create_student(NewProfile::new("stu-2", "Ben"), "S-002", "Physics", 2023, None)
            .unwrap();
        (SqliteReferenceStore::new(db.pool()), profiles)
    }

    fn new_ref(id: &str, student_id: &str) -> NewReference {
        NewReference {
            id: id.to_string(),
            student_id: student_id.to_string(),
            content_ref: format!("content-{}", id),
        }
    }

    #[test]
    fn test_create_starts_as_draft() {
        let (store, _) = setup();
        let created = store.create(new_ref("r1", "stu-1")).unwrap();
        assert_eq!(created.status, AchievementStatus::Draft);
        assert!(created.submitted_at.is_none());
        assert!(created.verified_by.is_none());

        let by_content = store.get_by_content_ref("content-r1").unwrap().unwrap();
        assert_eq!(by_content.id, "r1");
    }

    #[test]
    fn test_cas_conflict_and_not_found() {
        let (store, _) = setup();
        store.create(new_ref("r1", "stu-1")).unwrap();

        let submitted = store
            .update_status_atomic(
                "r1",
                AchievementStatus::Draft,
                StatusTransition::Submit { at: Utc::now() },
            )
            .unwrap();
        assert_eq!(submitted.status, AchievementStatus::Submitted);
        assert!(submitted.submitted_at.is_some());

        let err = store
            .update_status_atomic(
                "r1",
                AchievementStatus::Draft,
                StatusTransition::Submit { at: Utc::now() },
            )
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));

        let err = store.soft_delete("missing").unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn test_reject_sets_reviewer_and_note() {
        let (store, _) = setup();
        store.create(new_ref("r1", "stu-1")).unwrap();
        store
            .update_status_atomic("r1", AchievementStatus::Draft, StatusTransition::Submit { at: Utc::now() })
            .unwrap();

        let rejected = store
            .update_status_atomic(
                "r1",
                AchievementStatus::Submitted,
                StatusTransition::Reject {
                    by: "lec-1".to_string(),
                    at: Utc::now(),
                    note: "missing certificate".to_string(),
                },
            )
            .unwrap();
        assert_eq!(rejected.status, AchievementStatus::Rejected);
        assert_eq!(rejected.verified_by.as_deref(), Some("lec-1"));
        assert!(rejected.verified_at.is_some());
        assert_eq!(rejected.rejection_note.as_deref(), Some("missing certificate"));
    }

    #[test]
    fn test_soft_delete_retains_row() {
        let (store, _) = setup();
        store.create(new_ref("r1", "stu-1")).unwrap();
        let deleted = store.soft_delete("r1").unwrap();
        assert_eq!(deleted.status, AchievementStatus::Deleted);
        assert!(store.get_by_id("r1").unwrap().is_some());

        let visible = ReferenceFilter::visible(ScopePredicate::Unrestricted);
        assert_eq!(store.count(&visible).unwrap(), 0);
    }

    #[test]
    fn test_touch_requires_expected_status() {
        let (store, _) = setup();
        let created = store.create(new_ref("r1", "stu-1")).unwrap();
        let touched = store.touch("r1", AchievementStatus::Draft).unwrap();
        assert!(touched.updated_at >= created.updated_at);

        let err = store.touch("r1", AchievementStatus::Submitted).unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[test]
    fn test_scope_is_pushed_into_query() {
        let (store, _) = setup();
        store.create(new_ref("r1", "stu-1")).unwrap();
        store.create(new_ref("r2", "stu-1")).unwrap();
        store.create(new_ref("r3", "stu-2")).unwrap();

        let advisees = ReferenceFilter::visible(ScopePredicate::AdviseesOf("lec-1".into()));
        let listed = store.list(&advisees, Pagination::new(1, 10)).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|r| r.student_id == "stu-1"));

        let own = ReferenceFilter::visible(ScopePredicate::OwnOnly("stu-2".into()));
        assert_eq!(store.count(&own).unwrap(), 1);

        let all = ReferenceFilter::visible(ScopePredicate::Unrestricted);
        assert_eq!(store.count(&all).unwrap(), 3);
        let page_two = store.list(&all, Pagination::new(2, 2)).unwrap();
        assert_eq!(page_two.len(), 1);
    }

    #[test]
    fn test_list_orders_newest_first_with_id_tiebreak() {
        let (store, _) = setup();
        store.create(new_ref("a", "stu-1")).unwrap();
        store.create(new_ref("b", "stu-1")).unwrap();
        store.create(new_ref("c", "stu-1")).unwrap();

        let all = store
            .list_all(&ReferenceFilter::visible(ScopePredicate::Unrestricted))
            .unwrap();
        for pair in all.windows(2) {
            assert!(
                (pair[0].created_at, &pair[0].id) > (pair[1].created_at, &pair[1].id),
                "not descending: {} then {}",
                pair[0].id,
                pair[1].id
            );
        }
    }

    #[test]
    fn test_breakdowns() {
        let (store, _) = setup();
        for id in ["r1", "r2", "r3"] {
            store.create(new_ref(id, "stu-1")).unwrap();
        }
        for id in ["r1", "r2"] {
            store
                .update_status_atomic(id, AchievementStatus::Draft, StatusTransition::Submit { at: Utc::now() })
                .unwrap();
        }
        let verified_at = "2024-03-15T08:00:00.000Z".parse::<DateTime<Utc>>().unwrap();
        store
            .update_status_atomic(
                "r1",
                AchievementStatus::Submitted,
                StatusTransition::Verify { by: "lec-1".into(), at: verified_at },
            )
            .unwrap();

        let filter = ReferenceFilter::visible(ScopePredicate::Unrestricted);
        let counts = store.count_by_status(&filter).unwrap();
        assert_eq!(counts.get(&AchievementStatus::Draft), Some(&1));
        assert_eq!(counts.get(&AchievementStatus::Submitted), Some(&1));
        assert_eq!(counts.get(&AchievementStatus::Verified), Some(&1));
        assert_eq!(counts.get(&AchievementStatus::Rejected), None);

        let periods = store.verified_by_period(&filter, 12).unwrap();
        assert_eq!(periods, vec![("2024-03".to_string(), 1)]);
    }

    #[test]
    fn test_status_counts_grouped_within_scope() {
        let (store, _) = setup();
        for id in ["a1", "a2", "a3", "a4"] {
            store.create(new_ref(id, "stu-1")).unwrap();
        }
        for id in ["b1", "b2"] {
            store.create(new_ref(id, "stu-2")).unwrap();
        }
        store
            .update_status_atomic("a4", AchievementStatus::Draft, StatusTransition::Delete)
            .unwrap();
        store
            .update_status_atomic("a1", AchievementStatus::Draft, StatusTransition::Submit { at: Utc::now() })
            .unwrap();

        let advisees = ReferenceFilter::visible(ScopePredicate::AdviseesOf("lec-1".into()));
        let counts = store.count_by_status(&advisees).unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts.get(&AchievementStatus::Draft), Some(&2));
        assert_eq!(counts.get(&AchievementStatus::Submitted), Some(&1));
        assert_eq!(counts.get(&AchievementStatus::Deleted), None);

        let mut with_deleted = advisees.clone();
        with_deleted.exclude_deleted = false;
        let counts = store.count_by_status(&with_deleted).unwrap();
        assert_eq!(counts.get(&AchievementStatus::Deleted), Some(&1));

        let ben = ReferenceFilter::visible(ScopePredicate::OwnOnly("stu-2".into()));
        let counts = store.count_by_status(&ben).unwrap();
        assert_eq!(counts.into_iter().collect::<Vec<_>>(), vec![(AchievementStatus::Draft, 2)]);

        let empty = ReferenceFilter::visible(ScopePredicate::AdviseesOf("lec-9".into()));
        assert!(store.count_by_status(&empty).unwrap().is_empty());
    }

    #[test]
    fn test_pagination_normalized() {
        assert_eq!(Pagination::new(0, 0).normalized(10, 100), Pagination::new(1, 10));
        assert_eq!(Pagination::new(3, 500).normalized(10, 100), Pagination::new(3, 100));
        assert_eq!(Pagination::new(3, 20).offset(), 40);
    }
}
