mod common;

use common::*;
use haven_core::reconcile::BedRef;
use haven_core::{reconcile, AssignmentService, ResidentStatus};

fn bed_ref(house_id: &str, bed_id: &str) -> BedRef {
    BedRef {
        house_id: house_id.to_string(),
        bed_id: bed_id.to_string(),
    }
}

#[tokio::test]
async fn given_consistent_store_then_reconcile_writes_nothing() {
    let repo = memory_repo(&[resident("r1", ResidentStatus::Pending, "hA")]).await;
    AssignmentService::new(repo.clone())
        .admit("r1", "hA", "room1", "bed1")
        .await
        .unwrap();
    let houses_before = repo.list::<haven_core::House>().await.unwrap();

    let report = reconcile(&repo).await.unwrap();

    assert!(report.is_clean());
    assert_eq!(repo.list::<haven_core::House>().await.unwrap(), houses_before);
}

#[tokio::test]
async fn given_bed_claiming_unassigned_resident_then_bed_is_cleared() {
    // The state left behind when a bed write landed but the resident write did not
    let repo = memory_repo(&[resident("r1", ResidentStatus::Active, "hA")]).await;
    force_occupant(&repo, "hA", "bed1", Some("r1")).await;

    let report = reconcile(&repo).await.unwrap();

    assert_eq!(report.beds_cleared, vec![bed_ref("hA", "bed1")]);
    assert_eq!(occupant(&house_of(&repo, "hA").await, "bed1"), None);
    assert_invariants(&repo).await;
}

#[tokio::test]
async fn given_double_booking_then_only_the_claimed_bed_is_kept() {
    let repo = memory_repo(&[resident("r2", ResidentStatus::Pending, "hX")]).await;
    AssignmentService::new(repo.clone())
        .admit("r2", "hX", "roomX", "bed3")
        .await
        .unwrap();
    force_occupant(&repo, "hY", "bed7", Some("r2")).await;

    let report = reconcile(&repo).await.unwrap();

    assert_eq!(report.beds_cleared, vec![bed_ref("hY", "bed7")]);
    assert_eq!(occupant(&house_of(&repo, "hX").await, "bed3").as_deref(), Some("r2"));
    assert_invariants(&repo).await;
}

#[tokio::test]
async fn given_active_resident_pointing_at_vacant_bed_then_bed_is_relinked() {
    let mut r1 = resident("r1", ResidentStatus::Active, "hB");
    r1.assigned_house_id = Some("hB".to_string());
    r1.assigned_bed_id = Some("bed9".to_string());
    let repo = memory_repo(&[r1]).await;

    let report = reconcile(&repo).await.unwrap();

    assert_eq!(report.beds_relinked, vec![bed_ref("hB", "bed9")]);
    assert_eq!(occupant(&house_of(&repo, "hB").await, "bed9").as_deref(), Some("r1"));
}

#[tokio::test]
async fn given_alumni_with_leftover_assignment_then_assignment_is_cleared() {
    let mut r1 = resident("r1", ResidentStatus::Alumni, "hA");
    r1.assigned_house_id = Some("hA".to_string());
    r1.assigned_bed_id = Some("bed1".to_string());
    let repo = memory_repo(&[r1]).await;
    force_occupant(&repo, "hA", "bed1", Some("r1")).await;

    let report = reconcile(&repo).await.unwrap();

    assert_eq!(report.assignments_cleared, vec!["r1".to_string()]);
    assert_eq!(report.beds_cleared, vec![bed_ref("hA", "bed1")]);
    assert_invariants(&repo).await;
}

#[tokio::test]
async fn given_two_residents_claiming_one_bed_then_the_occupant_keeps_it() {
    let mut r1 = resident("r1", ResidentStatus::Active, "hA");
    r1.assigned_house_id = Some("hA".to_string());
    r1.assigned_bed_id = Some("bed1".to_string());
    let mut r2 = r1.clone();
    r2.id = "r2".to_string();
    r2.intake.personal.email = "r2@example.com".to_string();
    let repo = memory_repo(&[r1, r2]).await;
    force_occupant(&repo, "hA", "bed1", Some("r2")).await;

    let report = reconcile(&repo).await.unwrap();

    assert_eq!(report.assignments_cleared, vec!["r1".to_string()]);
    assert_eq!(occupant(&house_of(&repo, "hA").await, "bed1").as_deref(), Some("r2"));
    assert_invariants(&repo).await;
}

#[tokio::test]
async fn given_assignment_to_missing_bed_then_assignment_is_cleared() {
    let mut r1 = resident("r1", ResidentStatus::Active, "hA");
    r1.assigned_house_id = Some("hA".to_string());
    r1.assigned_bed_id = Some("bed-gone".to_string());
    let repo = memory_repo(&[r1]).await;

    let report = reconcile(&repo).await.unwrap();

    assert_eq!(report.assignments_cleared, vec!["r1".to_string()]);
    assert_eq!(resident_of(&repo, "r1").await.assigned_bed_id, None);
}

#[tokio::test]
async fn given_reconcile_runs_twice_then_second_run_is_clean() {
    let repo = memory_repo(&[resident("r1", ResidentStatus::Active, "hA")]).await;
    force_occupant(&repo, "hA", "bed1", Some("r1")).await;
    force_occupant(&repo, "hB", "bed9", Some("ghost")).await;

    let first = reconcile(&repo).await.unwrap();
    let second = reconcile(&repo).await.unwrap();

    assert_eq!(first.beds_cleared.len(), 2);
    assert!(second.is_clean());
}
