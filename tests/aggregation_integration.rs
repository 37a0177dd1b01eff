//! Statistics and student reports over both stores

mod common;

use achievement_ledger::services::Services;
use achievement_ledger::{
    AchievementStatus, AchievementType, ContentStore, LedgerError, ReferenceStore,
};

use common::*;

/// Create, submit and verify one achievement; returns the reference id
fn verified(services: &Services, student_id: &str, advisor_id: &str, kind: AchievementType, points: u32) -> String {
    let created = services
        .lifecycle
        .create(&student(student_id), achievement(kind, "Verified work", points))
        .unwrap();
    let id = created.reference.id;
    services.lifecycle.submit(&student(student_id), &id).unwrap();
    services.lifecycle.verify(&advisor(advisor_id), &id).unwrap();
    id
}

fn verified_competition(services: &Services, student_id: &str, advisor_id: &str, level: &str, points: u32) -> String {
    let created = services
        .lifecycle
        .create(&student(student_id), competition("Contest", points, level))
        .unwrap();
    let id = created.reference.id;
    services.lifecycle.submit(&student(student_id), &id).unwrap();
    services.lifecycle.verify(&advisor(advisor_id), &id).unwrap();
    id
}

#[test]
fn test_statistics_for_admin() {
    let fixture = Fixture::new();
    let services = fixture.services();

    verified_competition(&services, "stu-1", "lec-1", "national", 40);
    verified_competition(&services, "stu-1", "lec-1", "regional", 20);
    verified(&services, "stu-2", "lec-2", AchievementType::Academic, 70);
    // Unreviewed rows count in the status breakdown only
    services
        .lifecycle
        .create(&student("stu-3"), achievement(AchievementType::Other, "Draft", 99))
        .unwrap();

    let stats = services.aggregation.statistics(&admin()).unwrap();

    assert_eq!(stats.total_achievements, 4);
    assert_eq!(stats.status_breakdown.get(&AchievementStatus::Verified), Some(&3));
    assert_eq!(stats.status_breakdown.get(&AchievementStatus::Draft), Some(&1));
    assert_eq!(stats.total_points, 130);
    assert_eq!(stats.total_by_type.get(&AchievementType::Competition), Some(&2));
    assert_eq!(stats.total_by_type.get(&AchievementType::Academic), Some(&1));
    assert_eq!(stats.total_by_type.get(&AchievementType::Other), None);
    assert_eq!(stats.competition_level_distribution.get("national"), Some(&1));
    assert_eq!(stats.competition_level_distribution.get("regional"), Some(&1));

    // Count first, then points
    let ranking: Vec<_> = stats
        .top_students
        .iter()
        .map(|t| (t.student_id.as_str(), t.achievement_count, t.total_points))
        .collect();
    assert_eq!(ranking, vec![("stu-1", 2, 60), ("stu-2", 1, 70)]);
    assert_eq!(stats.top_students[0].student_code.as_deref(), Some("S-001"));
    assert_eq!(stats.top_students[0].student_name.as_deref(), Some("Ana"));

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["totalAchievements"], 4);
    assert_eq!(json["statusBreakdown"]["verified"], 3);
    assert_eq!(json["competitionLevelDistribution"]["national"], 1);
    assert_eq!(json["topStudents"][0]["studentCode"], "S-001");
    assert_eq!(json["topStudents"][0]["achievementCount"], 2);
}

#[test]
fn test_statistics_respect_scope() {
    let fixture = Fixture::new();
    let services = fixture.services();

    verified(&services, "stu-1", "lec-1", AchievementType::Publication, 10);
    verified(&services, "stu-2", "lec-2", AchievementType::Publication, 25);

    let lee = services.aggregation.statistics(&advisor("lec-1")).unwrap();
    assert_eq!(lee.total_achievements, 1);
    assert_eq!(lee.total_points, 10);
    assert_eq!(lee.top_students.len(), 1);
    assert_eq!(lee.top_students[0].student_id, "stu-1");

    let ben = services.aggregation.statistics(&student("stu-2")).unwrap();
    assert_eq!(ben.total_achievements, 1);
    assert_eq!(ben.total_points, 25);
    assert!(ben.top_students.is_empty());
}

#[test]
fn test_verified_period_buckets() {
    let fixture = Fixture::new();
    let services = fixture.services();

    let id = verified(&services, "stu-1", "lec-1", AchievementType::Academic, 5);
    verified(&services, "stu-1", "lec-1", AchievementType::Academic, 5);

    let verified_at = services
        .lifecycle
        .get(&admin(), &id)
        .unwrap()
        .reference
        .verified_at
        .unwrap();
    let stats = services.aggregation.statistics(&admin()).unwrap();

    assert_eq!(stats.total_by_period.len(), 1);
    assert_eq!(stats.total_by_period[0].period, verified_at.format("%Y-%m").to_string());
    assert_eq!(stats.total_by_period[0].count, 2);
}

#[test]
fn test_missing_content_is_skipped_not_counted() {
    let fixture = Fixture::new();
    let services = fixture.services();

    verified(&services, "stu-1", "lec-1", AchievementType::Academic, 10);
    let lost = verified(&services, "stu-1", "lec-1", AchievementType::Academic, 90);
    let content_ref = fixture
        .references
        .get_by_id(&lost)
        .unwrap()
        .unwrap()
        .content_ref;
    fixture.contents.delete(&content_ref).unwrap();

    let stats = services.aggregation.statistics(&admin()).unwrap();
    // Status counts come from the reference store alone
    assert_eq!(stats.total_achievements, 2);
    assert_eq!(stats.total_points, 10);
    assert_eq!(stats.total_by_type.get(&AchievementType::Academic), Some(&1));
    assert_eq!(stats.top_students[0].achievement_count, 1);
}

#[test]
fn test_student_report() {
    let fixture = Fixture::new();
    let services = fixture.services();
    let ana = student("stu-1");

    verified_competition(&services, "stu-1", "lec-1", "international", 80);
    let pending = services
        .lifecycle
        .create(&ana, achievement(AchievementType::Certification, "Pending", 15))
        .unwrap();
    services.lifecycle.submit(&ana, &pending.reference.id).unwrap();
    let rejected = services
        .lifecycle
        .create(&ana, achievement(AchievementType::Organization, "Rejected", 5))
        .unwrap();
    services.lifecycle.submit(&ana, &rejected.reference.id).unwrap();
    services
        .lifecycle
        .reject(&advisor("lec-1"), &rejected.reference.id, "no evidence")
        .unwrap();
    services
        .lifecycle
        .create(&ana, achievement(AchievementType::Other, "Draft", 1))
        .unwrap();
    let gone = services
        .lifecycle
        .create(&ana, achievement(AchievementType::Other, "Gone", 1))
        .unwrap();
    services.lifecycle.delete(&ana, &gone.reference.id).unwrap();

    let report = services.aggregation.student_report(&advisor("lec-1"), "stu-1").unwrap();

    assert_eq!(report.student.student_code, "S-001");
    assert_eq!(report.student.full_name.as_deref(), Some("Ana"));
    assert_eq!(report.student.advisor_name.as_deref(), Some("Dr. Lee"));

    assert_eq!(report.summary.total_achievements, 4);
    assert_eq!(report.summary.verified_count, 1);
    assert_eq!(report.summary.pending_count, 1);
    assert_eq!(report.summary.rejected_count, 1);
    assert_eq!(report.summary.draft_count, 1);
    assert_eq!(report.summary.total_points, 80);

    assert_eq!(report.achievements_by_type.get(&AchievementType::Competition), Some(&1));
    assert_eq!(report.achievements_by_type.len(), 1);
    assert_eq!(report.recent_achievements.len(), 4);
    assert!(report
        .recent_achievements
        .iter()
        .all(|view| view.reference.status != AchievementStatus::Deleted));
    assert_eq!(report.timeline.len(), 1);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["student"]["studentCode"], "S-001");
    assert_eq!(json["student"]["advisorName"], "Dr. Lee");
    assert_eq!(json["summary"]["verifiedCount"], 1);
    assert!(json["recentAchievements"][0]["content"].get("achievementType").is_some());
}

#[test]
fn test_student_report_scope() {
    let fixture = Fixture::new();
    let services = fixture.services();

    assert!(services.aggregation.student_report(&student("stu-1"), "stu-1").is_ok());
    assert!(services.aggregation.student_report(&admin(), "stu-3").is_ok());

    let err = services
        .aggregation
        .student_report(&student("stu-2"), "stu-1")
        .unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));

    let err = services
        .aggregation
        .student_report(&advisor("lec-2"), "stu-1")
        .unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));

    let err = services.aggregation.student_report(&admin(), "nobody").unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}

#[test]
fn test_reassigned_advisor_sees_history() {
    let fixture = Fixture::new();
    let services = fixture.services();
    verified(&services, "stu-2", "lec-2", AchievementType::Academic, 12);

    services.roster.set_advisor(&admin(), "stu-2", "lec-1").unwrap();

    let lee = services.aggregation.statistics(&advisor("lec-1")).unwrap();
    assert_eq!(lee.total_achievements, 1);
    let kim = services.aggregation.statistics(&advisor("lec-2")).unwrap();
    assert_eq!(kim.total_achievements, 0);
    assert!(kim.total_by_period.is_empty());
}
