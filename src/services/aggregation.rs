//! Aggregation engine - statistics and per-student reports
//!
//! Status counts come straight from the reference store. Anything that needs
//! type, points or competition level has to visit the content store, which
//! is done in batches through `get_many`. A reference whose content does not
//! resolve is skipped: it is neither counted as zero nor an error.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::content_store::{AchievementContent, ContentStore};
use crate::db::{
    AchievementReference, IdentityDirectory, Pagination, ProfileLookup, ReferenceFilter,
    ReferenceStore,
};
use crate::error::{LedgerError, LedgerResult};
use crate::model::{AchievementStatus, AchievementType, Principal, Role};
use crate::scope::ScopeResolver;

use super::views::{AchievementView, StudentInfo, ViewBuilder};
use super::ReportLimits;

/// Contents fetched per `get_many` call
const CONTENT_BATCH: usize = 100;

// ============================================================================
// Output types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodCount {
    /// `YYYY-MM`
    pub period: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopStudent {
    pub student_id: String,
    pub student_code: Option<String>,
    pub student_name: Option<String>,
    pub program_of_study: Option<String>,
    pub achievement_count: u64,
    pub total_points: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementStatistics {
    /// Verified achievements by type
    pub total_by_type: BTreeMap<AchievementType, u64>,
    pub total_by_period: Vec<PeriodCount>,
    /// Empty for student principals
    pub top_students: Vec<TopStudent>,
    pub competition_level_distribution: BTreeMap<String, u64>,
    pub total_achievements: u64,
    pub status_breakdown: BTreeMap<AchievementStatus, u64>,
    pub total_points: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub total_achievements: u64,
    pub verified_count: u64,
    pub pending_count: u64,
    pub draft_count: u64,
    pub rejected_count: u64,
    pub total_points: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub student: StudentInfo,
    pub summary: StudentSummary,
    pub achievements_by_type: BTreeMap<AchievementType, u64>,
    pub achievements_by_status: BTreeMap<AchievementStatus, u64>,
    pub recent_achievements: Vec<AchievementView>,
    pub timeline: Vec<PeriodCount>,
}

/// Running totals over verified contents
#[derive(Debug, Default)]
struct VerifiedFold {
    by_type: BTreeMap<AchievementType, u64>,
    levels: BTreeMap<String, u64>,
    per_student: HashMap<String, (u64, u64)>,
    total_points: u64,
    skipped: usize,
}

impl VerifiedFold {
    fn add(&mut self, reference: &AchievementReference, content: &AchievementContent) {
        *self.by_type.entry(content.achievement_type).or_insert(0) += 1;
        self.total_points += content.points as u64;

        if content.achievement_type == AchievementType::Competition {
            if let Some(level) = content.details.competition_level() {
                *self.levels.entry(level.to_string()).or_insert(0) += 1;
            }
        }

        let entry = self
            .per_student
            .entry(reference.student_id.clone())
            .or_insert((0, 0));
        entry.0 += 1;
        entry.1 += content.points as u64;
    }
}

// ============================================================================
// Engine
// ============================================================================

pub struct AggregationEngine {
    references: Arc<dyn ReferenceStore>,
    contents: Arc<dyn ContentStore>,
    profiles: Arc<dyn ProfileLookup>,
    directory: Arc<dyn IdentityDirectory>,
    scopes: ScopeResolver,
    views: ViewBuilder,
    limits: ReportLimits,
}

impl AggregationEngine {
    pub fn new(
        references: Arc<dyn ReferenceStore>,
        contents: Arc<dyn ContentStore>,
        profiles: Arc<dyn ProfileLookup>,
        directory: Arc<dyn IdentityDirectory>,
        views: ViewBuilder,
        limits: ReportLimits,
    ) -> Self {
        Self {
            scopes: ScopeResolver::new(profiles.clone()),
            references,
            contents,
            profiles,
            directory,
            views,
            limits,
        }
    }

    /// Resolve contents for `references` in batches, dropping unresolved ones
    fn resolve_contents(
        &self,
        references: Vec<AchievementReference>,
    ) -> LedgerResult<(Vec<(AchievementReference, AchievementContent)>, usize)> {
        let mut resolved = Vec::with_capacity(references.len());
        let mut skipped = 0;

        for batch in references.chunks(CONTENT_BATCH) {
            let refs: Vec<String> = batch.iter().map(|r| r.content_ref.clone()).collect();
            let mut found: HashMap<String, AchievementContent> = self
                .contents
                .get_many(&refs)?
                .into_iter()
                .map(|content| (content.id.clone(), content))
                .collect();

            for reference in batch {
                match found.remove(&reference.content_ref) {
                    Some(content) => resolved.push((reference.clone(), content)),
                    None => {
                        skipped += 1;
                        warn!(
                            id = %reference.id,
                            content_ref = %reference.content_ref,
                            "Content missing, skipped in aggregation"
                        );
                    }
                }
            }
        }

        Ok((resolved, skipped))
    }

    fn fold_verified(&self, filter: &ReferenceFilter) -> LedgerResult<VerifiedFold> {
        let verified = self
            .references
            .list_all(&filter.clone().with_status(AchievementStatus::Verified))?;
        let (resolved, skipped) = self.resolve_contents(verified)?;

        let mut fold = VerifiedFold {
            skipped,
            ..Default::default()
        };
        for (reference, content) in &resolved {
            fold.add(reference, content);
        }
        Ok(fold)
    }

    fn periods(&self, filter: &ReferenceFilter) -> LedgerResult<Vec<PeriodCount>> {
        Ok(self
            .references
            .verified_by_period(filter, self.limits.period_buckets)?
            .into_iter()
            .map(|(period, count)| PeriodCount { period, count })
            .collect())
    }

    fn top_students(&self, per_student: HashMap<String, (u64, u64)>) -> LedgerResult<Vec<TopStudent>> {
        let mut ranked: Vec<(String, u64, u64)> = per_student
            .into_iter()
            .map(|(id, (count, points))| (id, count, points))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(b.2.cmp(&a.2)).then(a.0.cmp(&b.0)));
        ranked.truncate(self.limits.top_students);

        let mut top = Vec::with_capacity(ranked.len());
        for (student_id, achievement_count, total_points) in ranked {
            let profile = self.profiles.student_profile(&student_id)?;
            top.push(TopStudent {
                student_name: self.directory.display_name(&student_id)?,
                student_code: profile.as_ref().map(|s| s.student_code.clone()),
                program_of_study: profile.map(|s| s.program_of_study),
                student_id,
                achievement_count,
                total_points,
            });
        }
        Ok(top)
    }

    /// Statistics over everything the caller can see
    pub fn statistics(&self, principal: &Principal) -> LedgerResult<AchievementStatistics> {
        let scope = self.scopes.resolve(principal)?;
        let filter = ReferenceFilter::visible(scope);

        let status_breakdown = self.references.count_by_status(&filter)?;
        let total_achievements = status_breakdown.values().sum();
        let fold = self.fold_verified(&filter)?;

        let top_students = match principal.role {
            Role::Student => Vec::new(),
            Role::Advisor | Role::Admin => self.top_students(fold.per_student)?,
        };

        debug!(
            principal = %principal,
            total = total_achievements,
            skipped = fold.skipped,
            "Statistics computed"
        );

        Ok(AchievementStatistics {
            total_by_type: fold.by_type,
            total_by_period: self.periods(&filter)?,
            top_students,
            competition_level_distribution: fold.levels,
            total_achievements,
            status_breakdown,
            total_points: fold.total_points,
        })
    }

    /// Report for one student the caller can see
    pub fn student_report(&self, principal: &Principal, student_id: &str) -> LedgerResult<StudentReport> {
        let scope = self.scopes.resolve(principal)?;
        let student = self
            .profiles
            .student_profile(student_id)?
            .ok_or_else(|| LedgerError::NotFound(format!("student {}", student_id)))?;
        if !scope.permits(&student) {
            return Err(LedgerError::Forbidden(format!(
                "report for student {} is outside the caller's scope",
                student_id
            )));
        }

        let filter = ReferenceFilter::visible(scope).for_student(student_id);
        let by_status = self.references.count_by_status(&filter)?;
        let fold = self.fold_verified(&filter)?;

        let count = |status: AchievementStatus| by_status.get(&status).copied().unwrap_or(0);
        let summary = StudentSummary {
            total_achievements: by_status.values().sum(),
            verified_count: count(AchievementStatus::Verified),
            pending_count: count(AchievementStatus::Submitted),
            draft_count: count(AchievementStatus::Draft),
            rejected_count: count(AchievementStatus::Rejected),
            total_points: fold.total_points,
        };

        let recent = self.references.list(
            &filter,
            Pagination::new(1, self.limits.recent_achievements as u32),
        )?;
        let (recent, _) = self.resolve_contents(recent)?;

        Ok(StudentReport {
            student: self.views.student_info(student)?,
            summary,
            achievements_by_type: fold.by_type,
            achievements_by_status: by_status,
            recent_achievements: self.views.build_many(recent),
            timeline: self.periods(&filter)?,
        })
    }
}
