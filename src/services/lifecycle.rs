//! Lifecycle coordinator - the review state machine across both stores
//!
//! ```text
//! draft ──submit──▶ submitted ──verify──▶ verified
//!   │                   └──────reject───▶ rejected
//!   └──delete──▶ deleted
//! ```
//!
//! Every operation checks, in order: role, reference exists, ownership or
//! advisor match, status precondition. Only then is the status CAS issued,
//! so a caller that lost a race sees `Conflict` while a caller acting on a
//! stale view sees `InvalidState`.
//!
//! Draft edits (update, attach) write the content first and then confirm
//! with a status CAS that the reference is still a draft. When a submit won
//! the race the content is put back and the edit fails with `Conflict`, so
//! submitted content never changes.
//!
//! Create is a two-step saga: content first, then the reference. If the
//! reference insert fails the content document is deleted again; if that
//! delete fails too the orphan is logged and announced on the event bus.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::content_store::{
    AchievementContent, Attachment, ContentDraft, ContentPatch, ContentStore,
};
use crate::db::{
    AchievementReference, NewReference, Pagination, ProfileLookup, ReferenceFilter,
    ReferenceStore, StatusTransition, Student,
};
use crate::details::Details;
use crate::error::{LedgerError, LedgerResult};
use crate::model::{AchievementStatus, AchievementType, Principal, Role};
use crate::scope::ScopeResolver;

use super::events::{EventBus, LedgerEvent};
use super::views::{AchievementPage, AchievementView, ViewBuilder};
use super::PageLimits;

// ============================================================================
// Inputs
// ============================================================================

/// Input for creating an achievement
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAchievementInput {
    pub achievement_type: AchievementType,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub details: Details,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub points: u32,
}

/// File metadata for an attachment; the upload itself happens elsewhere
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentInput {
    pub file_name: String,
    pub file_url: String,
    pub file_type: String,
}

/// Query parameters for listing
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<AchievementStatus>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
}

fn require_text(field: &str, value: &str) -> LedgerResult<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::ValidationFailed(format!("{} is required", field)));
    }
    Ok(())
}

// ============================================================================
// Coordinator
// ============================================================================

pub struct LifecycleCoordinator {
    references: Arc<dyn ReferenceStore>,
    contents: Arc<dyn ContentStore>,
    profiles: Arc<dyn ProfileLookup>,
    scopes: ScopeResolver,
    views: ViewBuilder,
    events: Arc<EventBus>,
    limits: PageLimits,
}

impl LifecycleCoordinator {
    pub fn new(
        references: Arc<dyn ReferenceStore>,
        contents: Arc<dyn ContentStore>,
        profiles: Arc<dyn ProfileLookup>,
        views: ViewBuilder,
        events: Arc<EventBus>,
        limits: PageLimits,
    ) -> Self {
        Self {
            scopes: ScopeResolver::new(profiles.clone()),
            references,
            contents,
            profiles,
            views,
            events,
            limits,
        }
    }

    // =========================================================================
    // Guards
    // =========================================================================

    fn require_role(principal: &Principal, role: Role, action: &str) -> LedgerResult<()> {
        if principal.role != role {
            return Err(LedgerError::Forbidden(format!(
                "{} cannot {} achievements",
                principal.role, action
            )));
        }
        Ok(())
    }

    fn load(&self, id: &str) -> LedgerResult<AchievementReference> {
        self.references
            .get_by_id(id)?
            .ok_or_else(|| LedgerError::NotFound(format!("achievement {}", id)))
    }

    fn student(&self, student_id: &str) -> LedgerResult<Student> {
        self.profiles
            .student_profile(student_id)?
            .ok_or_else(|| LedgerError::NotFound(format!("student {}", student_id)))
    }

    fn require_owner(principal: &Principal, reference: &AchievementReference) -> LedgerResult<()> {
        if reference.student_id != principal.identity {
            return Err(LedgerError::Forbidden(format!(
                "achievement {} belongs to another student",
                reference.id
            )));
        }
        Ok(())
    }

    fn require_advisor(&self, principal: &Principal, reference: &AchievementReference) -> LedgerResult<()> {
        let student = self.student(&reference.student_id)?;
        if student.advisor_id.as_deref() != Some(principal.identity.as_str()) {
            return Err(LedgerError::Forbidden(format!(
                "{} is not the advisor of student {}",
                principal.identity, reference.student_id
            )));
        }
        Ok(())
    }

    fn require_status(
        reference: &AchievementReference,
        expected: AchievementStatus,
        action: &str,
    ) -> LedgerResult<()> {
        if reference.status != expected {
            return Err(LedgerError::InvalidState(format!(
                "cannot {} achievement {}: status is {}, must be {}",
                action, reference.id, reference.status, expected
            )));
        }
        Ok(())
    }

    fn content_of(&self, reference: &AchievementReference) -> LedgerResult<AchievementContent> {
        self.contents
            .get_by_id(&reference.content_ref)?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("content for achievement {}", reference.id))
            })
    }

    /// Re-check that a reference is still a draft after its content was
    /// written. If it moved on meanwhile the write is undone with `snapshot`
    /// and the original error (usually `Conflict`) is returned.
    fn confirm_draft(
        &self,
        id: &str,
        snapshot: &AchievementContent,
    ) -> LedgerResult<AchievementReference> {
        match self.references.touch(id, AchievementStatus::Draft) {
            Ok(reference) => Ok(reference),
            Err(e) => {
                match self.contents.restore(snapshot) {
                    Ok(()) => warn!(
                        id = %id,
                        content_ref = %snapshot.id,
                        error = %e,
                        "Achievement left draft during a content edit, edit undone"
                    ),
                    Err(restore_error) => error!(
                        id = %id,
                        content_ref = %snapshot.id,
                        error = %restore_error,
                        "Failed to undo content edit on a non-draft achievement"
                    ),
                }
                Err(e.into())
            }
        }
    }

    fn view(&self, reference: AchievementReference) -> LedgerResult<AchievementView> {
        let content = self.content_of(&reference)?;
        Ok(self.views.build(reference, content))
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Create a draft achievement for the calling student
    pub fn create(
        &self,
        principal: &Principal,
        input: CreateAchievementInput,
    ) -> LedgerResult<AchievementView> {
        Self::require_role(principal, Role::Student, "create")?;
        let student = self.student(&principal.identity)?;
        require_text("title", &input.title)?;
        require_text("description", &input.description)?;

        let achievement_type = input.achievement_type;
        let title = input.title.clone();

        let content_ref = self.contents.create(ContentDraft {
            student_id: student.id.clone(),
            achievement_type: input.achievement_type,
            title: input.title,
            description: input.description,
            details: input.details,
            tags: input.tags,
            points: input.points,
        })?;

        let reference = match self.references.create(NewReference {
            id: Uuid::new_v4().to_string(),
            student_id: student.id.clone(),
            content_ref: content_ref.clone(),
        }) {
            Ok(reference) => reference,
            Err(e) => {
                self.compensate_create(&content_ref, &student.id);
                return Err(LedgerError::StoreUnavailable(format!(
                    "failed to record achievement: {}",
                    e
                )));
            }
        };

        self.events.emit(LedgerEvent::AchievementCreated {
            id: reference.id.clone(),
            student_id: student.id,
            achievement_type,
            title,
        });

        self.view(reference)
    }

    fn compensate_create(&self, content_ref: &str, student_id: &str) {
        match self.contents.delete(content_ref) {
            Ok(_) => {
                warn!(content_ref = %content_ref, "Reference insert failed, content rolled back");
            }
            Err(e) => {
                error!(
                    content_ref = %content_ref,
                    student_id = %student_id,
                    error = %e,
                    "Compensating delete failed, content orphaned"
                );
                self.events.emit(LedgerEvent::ContentOrphaned {
                    content_ref: content_ref.to_string(),
                    student_id: student_id.to_string(),
                });
            }
        }
    }

    /// Partial content update of a draft
    pub fn update(
        &self,
        principal: &Principal,
        id: &str,
        patch: ContentPatch,
    ) -> LedgerResult<AchievementView> {
        Self::require_role(principal, Role::Student, "update")?;
        let reference = self.load(id)?;
        Self::require_owner(principal, &reference)?;
        Self::require_status(&reference, AchievementStatus::Draft, "update")?;
        if patch.is_empty() {
            return Err(LedgerError::ValidationFailed("no fields to update".into()));
        }

        let snapshot = self.content_of(&reference)?;
        let content = self.contents.update(&reference.content_ref, &patch)?;
        let reference = self.confirm_draft(id, &snapshot)?;

        self.events.emit(LedgerEvent::AchievementUpdated { id: id.to_string() });
        Ok(self.views.build(reference, content))
    }

    /// Soft-delete a draft; the content document is kept
    pub fn delete(&self, principal: &Principal, id: &str) -> LedgerResult<AchievementReference> {
        Self::require_role(principal, Role::Student, "delete")?;
        let reference = self.load(id)?;
        Self::require_owner(principal, &reference)?;
        Self::require_status(&reference, AchievementStatus::Draft, "delete")?;

        let deleted = self.references.soft_delete(id)?;

        self.events.emit(LedgerEvent::AchievementDeleted { id: id.to_string() });
        Ok(deleted)
    }

    /// Hand a draft to the student's advisor
    pub fn submit(&self, principal: &Principal, id: &str) -> LedgerResult<AchievementView> {
        Self::require_role(principal, Role::Student, "submit")?;
        let reference = self.load(id)?;
        Self::require_owner(principal, &reference)?;
        Self::require_status(&reference, AchievementStatus::Draft, "submit")?;

        let student = self.student(&reference.student_id)?;
        if student.advisor_id.is_none() {
            return Err(LedgerError::InvalidState(format!(
                "student {} has no advisor assigned",
                student.id
            )));
        }

        let submitted = self.references.update_status_atomic(
            id,
            AchievementStatus::Draft,
            StatusTransition::Submit { at: Utc::now() },
        )?;

        self.events.emit(LedgerEvent::AchievementSubmitted {
            id: id.to_string(),
            student_id: submitted.student_id.clone(),
        });
        self.view(submitted)
    }

    pub fn verify(&self, principal: &Principal, id: &str) -> LedgerResult<AchievementView> {
        Self::require_role(principal, Role::Advisor, "verify")?;
        let reference = self.load(id)?;
        self.require_advisor(principal, &reference)?;
        Self::require_status(&reference, AchievementStatus::Submitted, "verify")?;

        let verified = self.references.update_status_atomic(
            id,
            AchievementStatus::Submitted,
            StatusTransition::Verify {
                by: principal.identity.clone(),
                at: Utc::now(),
            },
        )?;

        self.events.emit(LedgerEvent::AchievementVerified {
            id: id.to_string(),
            verified_by: principal.identity.clone(),
        });
        self.view(verified)
    }

    pub fn reject(
        &self,
        principal: &Principal,
        id: &str,
        note: &str,
    ) -> LedgerResult<AchievementView> {
        Self::require_role(principal, Role::Advisor, "reject")?;
        let reference = self.load(id)?;
        self.require_advisor(principal, &reference)?;
        Self::require_status(&reference, AchievementStatus::Submitted, "reject")?;
        require_text("rejection note", note)?;

        let note = note.trim().to_string();
        let rejected = self.references.update_status_atomic(
            id,
            AchievementStatus::Submitted,
            StatusTransition::Reject {
                by: principal.identity.clone(),
                at: Utc::now(),
                note: note.clone(),
            },
        )?;

        self.events.emit(LedgerEvent::AchievementRejected {
            id: id.to_string(),
            verified_by: principal.identity.clone(),
            note,
        });
        self.view(rejected)
    }

    /// Record file metadata on a draft
    pub fn attach(
        &self,
        principal: &Principal,
        id: &str,
        input: AttachmentInput,
    ) -> LedgerResult<AchievementView> {
        Self::require_role(principal, Role::Student, "attach files to")?;
        let reference = self.load(id)?;
        Self::require_owner(principal, &reference)?;
        Self::require_status(&reference, AchievementStatus::Draft, "attach files to")?;
        require_text("file_name", &input.file_name)?;
        require_text("file_url", &input.file_url)?;
        require_text("file_type", &input.file_type)?;

        let snapshot = self.content_of(&reference)?;
        let content = self.contents.append_attachment(
            &reference.content_ref,
            Attachment {
                file_name: input.file_name.clone(),
                file_url: input.file_url,
                file_type: input.file_type,
                uploaded_at: Utc::now(),
            },
        )?;
        let reference = self.confirm_draft(id, &snapshot)?;

        self.events.emit(LedgerEvent::AttachmentAdded {
            id: id.to_string(),
            file_name: input.file_name,
        });
        Ok(self.views.build(reference, content))
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Single achievement, if the caller's scope covers its student
    pub fn get(&self, principal: &Principal, id: &str) -> LedgerResult<AchievementView> {
        let scope = self.scopes.resolve(principal)?;
        let reference = self.load(id)?;
        if reference.status == AchievementStatus::Deleted {
            return Err(LedgerError::NotFound(format!("achievement {}", id)));
        }

        let student = self.student(&reference.student_id)?;
        if !scope.permits(&student) {
            return Err(LedgerError::Forbidden(format!(
                "achievement {} is outside the caller's scope",
                id
            )));
        }

        debug!(id = %id, principal = %principal, "Achievement read");
        self.view(reference)
    }

    /// Paged list of everything visible to the caller
    pub fn list(&self, principal: &Principal, query: ListQuery) -> LedgerResult<AchievementPage> {
        let scope = self.scopes.resolve(principal)?;
        let mut filter = ReferenceFilter::visible(scope);
        filter.status = query.status;
        self.page(filter, query)
    }

    /// Paged list restricted to one student the caller can see
    pub fn list_for_student(
        &self,
        principal: &Principal,
        student_id: &str,
        query: ListQuery,
    ) -> LedgerResult<AchievementPage> {
        let scope = self.scopes.resolve(principal)?;
        let student = self.student(student_id)?;
        if !scope.permits(&student) {
            return Err(LedgerError::Forbidden(format!(
                "student {} is outside the caller's scope",
                student_id
            )));
        }

        let mut filter = ReferenceFilter::visible(scope).for_student(student_id);
        filter.status = query.status;
        self.page(filter, query)
    }

    fn page(&self, filter: ReferenceFilter, query: ListQuery) -> LedgerResult<AchievementPage> {
        let page = Pagination::new(query.page, query.limit)
            .normalized(self.limits.default_limit, self.limits.max_limit);

        let total = self.references.count(&filter)?;
        let references = self.references.list(&filter, page)?;

        let refs: Vec<String> = references.iter().map(|r| r.content_ref.clone()).collect();
        let mut contents: HashMap<String, AchievementContent> = self
            .contents
            .get_many(&refs)?
            .into_iter()
            .map(|content| (content.id.clone(), content))
            .collect();

        let mut pairs = Vec::with_capacity(references.len());
        for reference in references {
            match contents.remove(&reference.content_ref) {
                Some(content) => pairs.push((reference, content)),
                None => {
                    warn!(id = %reference.id, content_ref = %reference.content_ref, "Content missing, omitted from list");
                }
            }
        }

        debug!(total = total, returned = pairs.len(), page = page.page, "Achievements listed");
        Ok(AchievementPage::new(
            self.views.build_many(pairs),
            page.page,
            page.limit,
            total,
        ))
    }
}
