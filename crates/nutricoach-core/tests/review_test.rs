//! Integration tests for approving, rejecting and editing stored
//! suggestions.

use chrono::NaiveDate;
use uuid::Uuid;

use nutricoach_core::adjustment::{
    approve_adjustment, get_adjustment_for_checkin, reject_adjustment, update_feedback_text,
};
use nutricoach_core::error::OperationError;
use nutricoach_core::plan;
use nutricoach_db::models::{AdjustmentStatus, AdjustmentSuggestion, Confidence, PlanStatus};
use nutricoach_db::queries::adjustments::{self, NewAdjustment};
use nutricoach_test_utils::{TestDb, seed_plan};

/// An active source plan, its draft copy, and a pending suggestion linking
/// them.
async fn pending_suggestion(db: &TestDb) -> AdjustmentSuggestion {
    let patient = Uuid::new_v4();
    let source = seed_plan(&db.pool, patient, PlanStatus::Active).await;

    let mut tx = db.pool.begin().await.unwrap();
    let copy = plan::duplicate_plan(&mut tx, &source, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())
        .await
        .unwrap();
    let row = adjustments::insert_adjustment(
        &mut *tx,
        &NewAdjustment {
            checkin_id: Uuid::new_v4(),
            patient_id: patient,
            original_plan_id: source.plan.id,
            suggested_plan_id: copy.plan.id,
            summary: "Menos arroz".into(),
            feedback_text: "Bom trabalho!".into(),
            confidence: Confidence::Medium,
            ai_response: serde_json::json!({}),
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();
    row
}

async fn plan_status(db: &TestDb, id: Uuid) -> PlanStatus {
    plan::get_plan_with_meals(&db.pool, id)
        .await
        .unwrap()
        .unwrap()
        .plan
        .status
}

#[tokio::test]
async fn approve_and_activate_releases_suggested_plan() {
    let db = TestDb::create().await;
    let s = pending_suggestion(&db).await;

    let approved = approve_adjustment(&db.pool, s.id, true, Some("dra.ana")).await.unwrap();

    assert_eq!(approved.status, AdjustmentStatus::Approved);
    assert!(approved.reviewed_at.is_some());
    assert_eq!(approved.reviewed_by.as_deref(), Some("dra.ana"));
    assert_eq!(plan_status(&db, s.suggested_plan_id).await, PlanStatus::Active);
    assert_eq!(plan_status(&db, s.original_plan_id).await, PlanStatus::Active);

    db.cleanup().await;
}

#[tokio::test]
async fn approve_without_activation_keeps_draft() {
    let db = TestDb::create().await;
    let s = pending_suggestion(&db).await;

    let approved = approve_adjustment(&db.pool, s.id, false, None).await.unwrap();

    assert_eq!(approved.status, AdjustmentStatus::Approved);
    assert_eq!(approved.reviewed_by, None);
    assert_eq!(plan_status(&db, s.suggested_plan_id).await, PlanStatus::Draft);

    db.cleanup().await;
}

#[tokio::test]
async fn failed_activation_leaves_suggestion_pending() {
    let db = TestDb::create().await;
    let s = pending_suggestion(&db).await;

    // Released out of band, so releasing again inside approval fails.
    plan::release_plan(&db.pool, s.suggested_plan_id).await.unwrap();

    let err = approve_adjustment(&db.pool, s.id, true, None).await.unwrap_err();
    assert!(format!("{err:#}").contains("must be draft"));
    assert!(matches!(err, OperationError::WrongStatus { kind: "plan", .. }));

    let row = adjustments::get_adjustment(&db.pool, s.id).await.unwrap().unwrap();
    assert_eq!(row.status, AdjustmentStatus::Pending);
    assert!(row.reviewed_at.is_none());

    db.cleanup().await;
}

#[tokio::test]
async fn reject_touches_no_plan() {
    let db = TestDb::create().await;
    let s = pending_suggestion(&db).await;

    let rejected = reject_adjustment(&db.pool, s.id, Some("dra.ana")).await.unwrap();

    assert_eq!(rejected.status, AdjustmentStatus::Rejected);
    assert!(rejected.reviewed_at.is_some());
    assert_eq!(plan_status(&db, s.suggested_plan_id).await, PlanStatus::Draft);
    assert_eq!(plan_status(&db, s.original_plan_id).await, PlanStatus::Active);

    db.cleanup().await;
}

#[tokio::test]
async fn settled_suggestions_cannot_move_again() {
    let db = TestDb::create().await;
    let s = pending_suggestion(&db).await;

    approve_adjustment(&db.pool, s.id, false, None).await.unwrap();

    let err = approve_adjustment(&db.pool, s.id, false, None).await.unwrap_err();
    assert!(
        err.to_string().contains("current status is approved (must be pending)"),
        "unexpected error: {err}"
    );
    assert!(matches!(err, OperationError::WrongStatus { kind: "adjustment", id, .. } if id == s.id));
    let err = reject_adjustment(&db.pool, s.id, None).await.unwrap_err();
    assert!(err.to_string().contains("current status is approved"));

    db.cleanup().await;
}

#[tokio::test]
async fn unknown_suggestion_is_not_found() {
    let db = TestDb::create().await;
    let id = Uuid::new_v4();

    let err = approve_adjustment(&db.pool, id, true, None).await.unwrap_err();
    assert_eq!(err.to_string(), format!("adjustment {id} not found"));
    assert!(matches!(err, OperationError::NotFound { kind: "adjustment", .. }));
    let err = reject_adjustment(&db.pool, id, None).await.unwrap_err();
    assert_eq!(err.to_string(), format!("adjustment {id} not found"));
    let err = update_feedback_text(&db.pool, id, "x").await.unwrap_err();
    assert!(matches!(err, OperationError::NotFound { .. }));

    db.cleanup().await;
}

#[tokio::test]
async fn feedback_text_is_editable_and_lookup_by_checkin_works() {
    let db = TestDb::create().await;
    let s = pending_suggestion(&db).await;

    let updated = update_feedback_text(&db.pool, s.id, "Texto revisado pela nutricionista.")
        .await
        .unwrap();
    assert_eq!(updated.feedback_text, "Texto revisado pela nutricionista.");
    assert_eq!(updated.status, AdjustmentStatus::Pending);

    let found = get_adjustment_for_checkin(&db.pool, s.checkin_id).await.unwrap().unwrap();
    assert_eq!(found.id, s.id);
    assert_eq!(found.feedback_text, "Texto revisado pela nutricionista.");
    assert!(get_adjustment_for_checkin(&db.pool, Uuid::new_v4()).await.unwrap().is_none());

    db.cleanup().await;
}
