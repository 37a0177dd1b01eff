//! Roster service - advisor assignment and scoped student and lecturer reads
//!
//! Student reads use the same visibility as achievements: a student sees
//! itself, an advisor its advisees, an admin everyone. The scope is pushed
//! into the roster query, so pages and totals only ever count visible rows.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::db::{Pagination, ProfileLookup, Student, StudentRoster};
use crate::error::{LedgerError, LedgerResult};
use crate::model::{Principal, Role};
use crate::scope::{ScopePredicate, ScopeResolver};

use super::events::{EventBus, LedgerEvent};
use super::views::{LecturerInfo, StudentInfo, ViewBuilder};
use super::PageLimits;

/// One page of roster entries plus totals
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterPage<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> RosterPage<T> {
    fn new(items: Vec<T>, page: Pagination, total: u64) -> Self {
        let total_pages = if page.limit == 0 {
            0
        } else {
            total.div_ceil(page.limit as u64)
        };
        Self {
            items,
            page: page.page,
            limit: page.limit,
            total,
            total_pages,
        }
    }
}

pub struct RosterService {
    roster: Arc<dyn StudentRoster>,
    profiles: Arc<dyn ProfileLookup>,
    scopes: ScopeResolver,
    views: ViewBuilder,
    events: Arc<EventBus>,
    limits: PageLimits,
}

impl RosterService {
    pub fn new(
        roster: Arc<dyn StudentRoster>,
        profiles: Arc<dyn ProfileLookup>,
        views: ViewBuilder,
        events: Arc<EventBus>,
        limits: PageLimits,
    ) -> Self {
        Self {
            roster,
            scopes: ScopeResolver::new(profiles.clone()),
            profiles,
            views,
            events,
            limits,
        }
    }

    fn normalize(&self, page: Pagination) -> Pagination {
        page.normalized(self.limits.default_limit, self.limits.max_limit)
    }

    fn students_page(
        &self,
        scope: &ScopePredicate,
        page: Pagination,
    ) -> LedgerResult<RosterPage<StudentInfo>> {
        let page = self.normalize(page);
        let items = self
            .roster
            .list_students(scope, page)?
            .into_iter()
            .map(|student| self.views.student_info(student))
            .collect::<Result<Vec<_>, _>>()?;
        let total = self.roster.count_students(scope)?;

        debug!(scope = ?scope, page = page.page, total, "Students listed");
        Ok(RosterPage::new(items, page, total))
    }

    /// Assign `lecturer_id` as the advisor of `student_id` (admins only)
    pub fn set_advisor(
        &self,
        principal: &Principal,
        student_id: &str,
        lecturer_id: &str,
    ) -> LedgerResult<Student> {
        if principal.role != Role::Admin {
            return Err(LedgerError::Forbidden("only admins can assign advisors".into()));
        }
        if self.profiles.student_profile(student_id)?.is_none() {
            return Err(LedgerError::NotFound(format!("student {}", student_id)));
        }
        if self.profiles.lecturer_profile(lecturer_id)?.is_none() {
            return Err(LedgerError::NotFound(format!("lecturer {}", lecturer_id)));
        }

        let student = self.roster.set_advisor(student_id, lecturer_id)?;

        self.events.emit(LedgerEvent::AdvisorAssigned {
            student_id: student_id.to_string(),
            lecturer_id: lecturer_id.to_string(),
            by: principal.identity.clone(),
            by_role: principal.role,
        });
        Ok(student)
    }

    /// Students the caller can see, ordered by student code
    pub fn list_students(
        &self,
        principal: &Principal,
        page: Pagination,
    ) -> LedgerResult<RosterPage<StudentInfo>> {
        let scope = self.scopes.resolve(principal)?;
        self.students_page(&scope, page)
    }

    /// One student profile, if the caller can see it
    pub fn get_student(&self, principal: &Principal, student_id: &str) -> LedgerResult<StudentInfo> {
        let scope = self.scopes.resolve(principal)?;
        let student = self
            .profiles
            .student_profile(student_id)?
            .ok_or_else(|| LedgerError::NotFound(format!("student {}", student_id)))?;
        if !scope.permits(&student) {
            return Err(LedgerError::Forbidden(format!(
                "student {} is outside the caller's scope",
                student_id
            )));
        }
        Ok(self.views.student_info(student)?)
    }

    /// Every lecturer, ordered by lecturer code; open to any principal
    pub fn list_lecturers(&self, page: Pagination) -> LedgerResult<RosterPage<LecturerInfo>> {
        let page = self.normalize(page);
        let items = self
            .roster
            .list_lecturers(page)?
            .into_iter()
            .map(|lecturer| self.views.lecturer_info(lecturer))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RosterPage::new(items, page, self.roster.count_lecturers()?))
    }

    /// Students advised by `lecturer_id`; admins or that lecturer
    pub fn list_advisees(
        &self,
        principal: &Principal,
        lecturer_id: &str,
        page: Pagination,
    ) -> LedgerResult<RosterPage<StudentInfo>> {
        let allowed = match principal.role {
            Role::Admin => true,
            Role::Advisor => principal.identity == lecturer_id,
            Role::Student => false,
        };
        if !allowed {
            return Err(LedgerError::Forbidden(format!(
                "{} cannot list advisees of {}",
                principal, lecturer_id
            )));
        }
        if self.profiles.lecturer_profile(lecturer_id)?.is_none() {
            return Err(LedgerError::NotFound(format!("lecturer {}", lecturer_id)));
        }

        self.students_page(&ScopePredicate::AdviseesOf(lecturer_id.to_string()), page)
    }
}
