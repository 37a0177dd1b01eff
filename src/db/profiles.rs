//! Users, student and lecturer profiles, advisor assignment

use diesel::prelude::*;
use diesel::sqlite::Sqlite;
use tracing::info;

use super::diesel_schema::{lecturers, students, users};
use super::models::{current_timestamp, Lecturer, NewLecturer, NewStudent, NewUser, Student, User};
use super::references::Pagination;
use super::{checkout, sql_err, DbPool};
use crate::error::StorageError;
use crate::model::Role;
use crate::scope::ScopePredicate;

/// Read access to student and lecturer profiles
pub trait ProfileLookup: Send + Sync {
    fn student_profile(&self, student_id: &str) -> Result<Option<Student>, StorageError>;

    fn lecturer_profile(&self, lecturer_id: &str) -> Result<Option<Lecturer>, StorageError>;
}

/// Account directory
pub trait IdentityDirectory: Send + Sync {
    fn get_user(&self, user_id: &str) -> Result<Option<User>, StorageError>;

    /// Full name for display, `None` for unknown users
    fn display_name(&self, user_id: &str) -> Result<Option<String>, StorageError> {
        Ok(self.get_user(user_id)?.map(|user| user.full_name))
    }
}

/// Advisor assignment and roster listings
pub trait StudentRoster: Send + Sync {
    fn set_advisor(&self, student_id: &str, lecturer_id: &str) -> Result<Student, StorageError>;

    /// Students inside `scope`, ordered by student code
    fn list_students(
        &self,
        scope: &ScopePredicate,
        page: Pagination,
    ) -> Result<Vec<Student>, StorageError>;

    fn count_students(&self, scope: &ScopePredicate) -> Result<u64, StorageError>;

    /// All lecturers, ordered by lecturer code
    fn list_lecturers(&self, page: Pagination) -> Result<Vec<Lecturer>, StorageError>;

    fn count_lecturers(&self) -> Result<u64, StorageError>;
}

/// Account fields shared by every profile kind
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
}

impl NewProfile {
    /// Username defaults to the id
    pub fn new(id: impl Into<String>, full_name: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            username: id.clone(),
            email: format!("{}@localhost", id),
            full_name: full_name.into(),
            id,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }
}

/// Student rows visible under a scope
fn scoped_students(scope: &ScopePredicate) -> students::BoxedQuery<'static, Sqlite> {
    let query = students::table.into_boxed();
    match scope {
        ScopePredicate::OwnOnly(student_id) => query.filter(students::id.eq(student_id.clone())),
        ScopePredicate::AdviseesOf(lecturer_id) => {
            query.filter(students::advisor_id.eq(lecturer_id.clone()))
        }
        ScopePredicate::Unrestricted => query,
    }
}

fn insert_user(
    conn: &mut SqliteConnection,
    profile: &NewProfile,
    role: Role,
    now: &str,
) -> Result<(), StorageError> {
    diesel::insert_into(users::table)
        .values(NewUser {
            id: &profile.id,
            username: &profile.username,
            email: &profile.email,
            full_name: &profile.full_name,
            role: role.as_str(),
            is_active: 1,
            created_at: now,
        })
        .execute(conn)
        .map_err(sql_err("Insert user failed"))?;
    Ok(())
}

/// Profile and roster store over the shared SQLite pool
#[derive(Clone)]
pub struct SqliteProfileStore {
    pool: DbPool,
}

impl SqliteProfileStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Account without a student or lecturer profile (admins)
    pub fn create_user(&self, profile: NewProfile, role: Role) -> Result<User, StorageError> {
        let mut conn = checkout(&self.pool)?;
        let now = current_timestamp();
        insert_user(&mut conn, &profile, role, &now)?;
        info!(id = %profile.id, role = %role, "User created");

        users::table
            .find(&profile.id)
            .select(User::as_select())
            .first(&mut conn)
            .map_err(sql_err("User query failed"))
    }

    pub fn create_student(
        &self,
        profile: NewProfile,
        student_code: &str,
        program_of_study: &str,
        academic_year: i32,
        advisor_id: Option<&str>,
    ) -> Result<Student, StorageError> {
        let mut conn = checkout(&self.pool)?;
        let now = current_timestamp();

        conn.immediate_transaction::<_, StorageError, _>(|conn| {
            insert_user(conn, &profile, Role::Student, &now)?;
            diesel::insert_into(students::table)
                .values(NewStudent {
                    id: &profile.id,
                    student_code,
                    program_of_study,
                    academic_year,
                    advisor_id,
                    created_at: &now,
                })
                .execute(conn)
                .map_err(sql_err("Insert student failed"))?;
            Ok(())
        })?;

        info!(id = %profile.id, student_code = %student_code, "Student created");
        students::table
            .find(&profile.id)
            .select(Student::as_select())
            .first(&mut conn)
            .map_err(sql_err("Student query failed"))
    }

    pub fn create_lecturer(
        &self,
        profile: NewProfile,
        lecturer_code: &str,
        department: &str,
    ) -> Result<Lecturer, StorageError> {
        let mut conn = checkout(&self.pool)?;
        let now = current_timestamp();

        conn.immediate_transaction::<_, StorageError, _>(|conn| {
            insert_user(conn, &profile, Role::Advisor, &now)?;
            diesel::insert_into(lecturers::table)
                .values(NewLecturer {
                    id: &profile.id,
                    lecturer_code,
                    department,
                    created_at: &now,
                })
                .execute(conn)
                .map_err(sql_err("Insert lecturer failed"))?;
            Ok(())
        })?;

        info!(id = %profile.id, lecturer_code = %lecturer_code, "Lecturer created");
        lecturers::table
            .find(&profile.id)
            .select(Lecturer::as_select())
            .first(&mut conn)
            .map_err(sql_err("Lecturer query failed"))
    }

    pub fn set_active(&self, user_id: &str, active: bool) -> Result<(), StorageError> {
        let mut conn = checkout(&self.pool)?;
        let affected = diesel::update(users::table.find(user_id))
            .set(users::is_active.eq(i32::from(active)))
            .execute(&mut conn)
            .map_err(sql_err("Update user failed"))?;
        if affected == 0 {
            return Err(StorageError::NotFound(format!("user {}", user_id)));
        }
        Ok(())
    }
}

impl ProfileLookup for SqliteProfileStore {
    fn student_profile(&self, student_id: &str) -> Result<Option<Student>, StorageError> {
        let mut conn = checkout(&self.pool)?;
        students::table
            .find(student_id)
            .select(Student::as_select())
            .first(&mut conn)
            .optional()
            .map_err(sql_err("Student query failed"))
    }

    fn lecturer_profile(&self, lecturer_id: &str) -> Result<Option<Lecturer>, StorageError> {
        let mut conn = checkout(&self.pool)?;
        lecturers::table
            .find(lecturer_id)
            .select(Lecturer::as_select())
            .first(&mut conn)
            .optional()
            .map_err(sql_err("Lecturer query failed"))
    }
}

impl IdentityDirectory for SqliteProfileStore {
    fn get_user(&self, user_id: &str) -> Result<Option<User>, StorageError> {
        let mut conn = checkout(&self.pool)?;
        users::table
            .find(user_id)
            .select(User::as_select())
            .first(&mut conn)
            .optional()
            .map_err(sql_err("User query failed"))
    }

    fn display_name(&self, user_id: &str) -> Result<Option<String>, StorageError> {
        let mut conn = checkout(&self.pool)?;
        users::table
            .find(user_id)
            .select(users::full_name)
            .first(&mut conn)
            .optional()
            .map_err(sql_err("User query failed"))
    }
}

impl StudentRoster for SqliteProfileStore {
    fn set_advisor(&self, student_id: &str, lecturer_id: &str) -> Result<Student, StorageError> {
        let mut conn = checkout(&self.pool)?;

        let affected = diesel::update(students::table.find(student_id))
            .set(students::advisor_id.eq(Some(lecturer_id)))
            .execute(&mut conn)
            .map_err(sql_err("Assign advisor failed"))?;
        if affected == 0 {
            return Err(StorageError::NotFound(format!("student {}", student_id)));
        }

        info!(student_id = %student_id, advisor_id = %lecturer_id, "Advisor assigned");
        students::table
            .find(student_id)
            .select(Student::as_select())
            .first(&mut conn)
            .map_err(sql_err("Student query failed"))
    }

    fn list_students(
        &self,
        scope: &ScopePredicate,
        page: Pagination,
    ) -> Result<Vec<Student>, StorageError> {
        let mut conn = checkout(&self.pool)?;
        scoped_students(scope)
            .select(Student::as_select())
            .order(students::student_code.asc())
            .limit(page.limit as i64)
            .offset(page.offset())
            .load(&mut conn)
            .map_err(sql_err("List students failed"))
    }

    fn count_students(&self, scope: &ScopePredicate) -> Result<u64, StorageError> {
        let mut conn = checkout(&self.pool)?;
        let total: i64 = scoped_students(scope)
            .count()
            .get_result(&mut conn)
            .map_err(sql_err("Count students failed"))?;
        Ok(total as u64)
    }

    fn list_lecturers(&self, page: Pagination) -> Result<Vec<Lecturer>, StorageError> {
        let mut conn = checkout(&self.pool)?;
        lecturers::table
            .select(Lecturer::as_select())
            .order(lecturers::lecturer_code.asc())
            .limit(page.limit as i64)
            .offset(page.offset())
            .load(&mut conn)
            .map_err(sql_err("List lecturers failed"))
    }

    fn count_lecturers(&self) -> Result<u64, StorageError> {
        let mut conn = checkout(&self.pool)?;
        let total: i64 = lecturers::table
            .count()
            .get_result(&mut conn)
            .map_err(sql_err("Count lecturers failed"))?;
        Ok(total as u64)
    }
}
