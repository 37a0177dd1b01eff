//! Visibility scoping
//!
//! A principal sees either its own achievements, those of its advisees, or
//! everything. The predicate is compiled into SQL by the reference store;
//! [`ScopePredicate::permits`] answers the single-record case.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::db::{ProfileLookup, Student};
use crate::error::{LedgerError, LedgerResult};
use crate::model::{Principal, Role};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ScopePredicate {
    /// Only achievements of this student
    OwnOnly(String),
    /// Achievements of students advised by this lecturer
    AdviseesOf(String),
    Unrestricted,
}

impl ScopePredicate {
    pub fn permits(&self, student: &Student) -> bool {
        match self {
            ScopePredicate::OwnOnly(student_id) => &student.id == student_id,
            ScopePredicate::AdviseesOf(lecturer_id) => {
                student.advisor_id.as_deref() == Some(lecturer_id.as_str())
            }
            ScopePredicate::Unrestricted => true,
        }
    }
}

/// Predicate for a principal, without checking its profile
pub fn scope_for(principal: &Principal) -> ScopePredicate {
    match principal.role {
        Role::Student => ScopePredicate::OwnOnly(principal.identity.clone()),
        Role::Advisor => ScopePredicate::AdviseesOf(principal.identity.clone()),
        Role::Admin => ScopePredicate::Unrestricted,
    }
}

/// Resolves a principal's visibility, requiring the matching profile
#[derive(Clone)]
pub struct ScopeResolver {
    profiles: Arc<dyn ProfileLookup>,
}

impl ScopeResolver {
    pub fn new(profiles: Arc<dyn ProfileLookup>) -> Self {
        Self { profiles }
    }

    pub fn resolve(&self, principal: &Principal) -> LedgerResult<ScopePredicate> {
        match principal.role {
            Role::Student => {
                if self.profiles.student_profile(&principal.identity)?.is_none() {
                    return Err(LedgerError::NotFound(format!(
                        "student profile {}",
                        principal.identity
                    )));
                }
            }
            Role::Advisor => {
                if self.profiles.lecturer_profile(&principal.identity)?.is_none() {
                    return Err(LedgerError::NotFound(format!(
                        "lecturer profile {}",
                        principal.identity
                    )));
                }
            }
            Role::Admin => {}
        }

        let scope = scope_for(principal);
        debug!(principal = %principal, scope = ?scope, "Scope resolved");
        Ok(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: &str, advisor: Option<&str>) -> Student {
        Student {
            id: id.to_string(),
            student_code: format!("S-{}", id),
            program_of_study: "Informatics".to_string(),
            academic_year: 2022,
            advisor_id: advisor.map(str::to_string),
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn test_permits() {
        let own = ScopePredicate::OwnOnly("stu-1".into());
        assert!(own.permits(&student("stu-1", None)));
        assert!(!own.permits(&student("stu-2", None)));

        let advisees = ScopePredicate::AdviseesOf("lec-1".into());
        assert!(advisees.permits(&student("stu-2", Some("lec-1"))));
        assert!(!advisees.permits(&student("stu-2", Some("lec-2"))));
        assert!(!advisees.permits(&student("stu-2", None)));

        assert!(ScopePredicate::Unrestricted.permits(&student("anyone", None)));
    }

    #[test]
    fn test_scope_for_roles() {
        assert_eq!(
            scope_for(&Principal::student("stu-1")),
            ScopePredicate::OwnOnly("stu-1".into())
        );
        assert_eq!(
            scope_for(&Principal::advisor("lec-1")),
            ScopePredicate::AdviseesOf("lec-1".into())
        );
        assert_eq!(scope_for(&Principal::admin("root")), ScopePredicate::Unrestricted);
    }
}
