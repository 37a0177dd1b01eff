//! Response shapes joining a reference with its content

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::content_store::AchievementContent;
use crate::db::{
    AchievementReference, IdentityDirectory, Lecturer, ProfileLookup, Student,
};
use crate::error::StorageError;

/// One achievement as callers see it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementView {
    #[serde(flatten)]
    pub reference: AchievementReference,
    pub content: AchievementContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifier_name: Option<String>,
}

/// Page of views plus totals
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementPage {
    pub items: Vec<AchievementView>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl AchievementPage {
    pub fn new(items: Vec<AchievementView>, page: u32, limit: u32, total: u64) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit as u64) };
        Self {
            items,
            page,
            limit,
            total,
            total_pages,
        }
    }
}

/// A student profile joined with its account and advisor name
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInfo {
    pub id: String,
    pub student_code: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub program_of_study: String,
    pub academic_year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisor_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LecturerInfo {
    pub id: String,
    pub lecturer_code: String,
    pub department: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Default)]
struct LookupCache {
    names: HashMap<String, Option<String>>,
    codes: HashMap<String, Option<String>>,
}

/// Enriches views with display names; a lookup miss leaves the field empty
#[derive(Clone)]
pub struct ViewBuilder {
    profiles: Arc<dyn ProfileLookup>,
    directory: Arc<dyn IdentityDirectory>,
}

impl ViewBuilder {
    pub fn new(profiles: Arc<dyn ProfileLookup>, directory: Arc<dyn IdentityDirectory>) -> Self {
        Self {
            profiles,
            directory,
        }
    }

    pub fn build(&self, reference: AchievementReference, content: AchievementContent) -> AchievementView {
        self.view(&mut LookupCache::default(), reference, content)
    }

    pub fn student_info(&self, student: Student) -> Result<StudentInfo, StorageError> {
        let (full_name, email) = self.account(&student.id)?;
        let advisor_name = match &student.advisor_id {
            Some(advisor_id) => self.directory.display_name(advisor_id)?,
            None => None,
        };

        Ok(StudentInfo {
            id: student.id,
            student_code: student.student_code,
            full_name,
            email,
            program_of_study: student.program_of_study,
            academic_year: student.academic_year,
            advisor_id: student.advisor_id,
            advisor_name,
        })
    }

    pub fn lecturer_info(&self, lecturer: Lecturer) -> Result<LecturerInfo, StorageError> {
        let (full_name, email) = self.account(&lecturer.id)?;
        Ok(LecturerInfo {
            id: lecturer.id,
            lecturer_code: lecturer.lecturer_code,
            department: lecturer.department,
            full_name,
            email,
        })
    }

    fn account(&self, user_id: &str) -> Result<(Option<String>, Option<String>), StorageError> {
        Ok(match self.directory.get_user(user_id)? {
            Some(user) => (Some(user.full_name), Some(user.email)),
            None => (None, None),
        })
    }

    /// Build views in order, looking each identity up once
    pub fn build_many(
        &self,
        pairs: Vec<(AchievementReference, AchievementContent)>,
    ) -> Vec<AchievementView> {
        let mut cache = LookupCache::default();
        pairs
            .into_iter()
            .map(|(reference, content)| self.view(&mut cache, reference, content))
            .collect()
    }

    fn view(
        &self,
        cache: &mut LookupCache,
        reference: AchievementReference,
        content: AchievementContent,
    ) -> AchievementView {
        let student_name = self.name(&mut cache.names, &reference.student_id);
        let student_code = cache
            .codes
            .entry(reference.student_id.clone())
            .or_insert_with(|| {
                self.profiles
                    .student_profile(&reference.student_id)
                    .map_err(|e| debug!(student_id = %reference.student_id, error = %e, "Student lookup failed"))
                    .ok()
                    .flatten()
                    .map(|student| student.student_code)
            })
            .clone();
        let verifier_name = reference
            .verified_by
            .as_deref()
            .and_then(|id| self.name(&mut cache.names, id));

        AchievementView {
            reference,
            content,
            student_name,
            student_code,
            verifier_name,
        }
    }

    fn name(&self, cache: &mut HashMap<String, Option<String>>, user_id: &str) -> Option<String> {
        cache
            .entry(user_id.to_string())
            .or_insert_with(|| {
                self.directory
                    .display_name(user_id)
                    .map_err(|e| debug!(user_id = %user_id, error = %e, "Name lookup failed"))
                    .ok()
                    .flatten()
            })
            .clone()
    }
}
