//! Integration tests for adjustment-suggestion rows and their guarded
//! status transitions.

use nutricoach_db::models::{AdjustmentStatus, Confidence, PlanStatus};
use nutricoach_db::queries::adjustments::{self, NewAdjustment};
use nutricoach_test_utils::{TestDb, seed_plan};
use uuid::Uuid;

async fn pending_suggestion(db: &TestDb, checkin_id: Uuid) -> nutricoach_db::models::AdjustmentSuggestion {
    let patient = Uuid::new_v4();
    let original = seed_plan(&db.pool, patient, PlanStatus::Active).await;
    let suggested = seed_plan(&db.pool, patient, PlanStatus::Draft).await;

    adjustments::insert_adjustment(
        &db.pool,
        &NewAdjustment {
            checkin_id,
            patient_id: patient,
            original_plan_id: original.plan.id,
            suggested_plan_id: suggested.plan.id,
            summary: "Reduzir carboidratos no almoço".into(),
            feedback_text: "Olá! Ajustamos seu almoço.".into(),
            confidence: Confidence::Medium,
            ai_response: serde_json::json!({ "adjustments": [] }),
        },
    )
    .await
    .expect("insert should succeed")
}

#[tokio::test]
async fn insert_starts_pending() {
    let db = TestDb::create().await;
    let row = pending_suggestion(&db, Uuid::new_v4()).await;

    assert_eq!(row.status, AdjustmentStatus::Pending);
    assert_eq!(row.confidence, Confidence::Medium);
    assert!(row.reviewed_at.is_none());
    assert!(row.reviewed_by.is_none());
    assert_eq!(row.ai_response["adjustments"], serde_json::json!([]));

    let fetched = adjustments::get_adjustment(&db.pool, row.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, row.id);

    let listed = adjustments::list_for_patient(&db.pool, row.patient_id).await.unwrap();
    assert_eq!(listed.len(), 1);

    db.cleanup().await;
}

#[tokio::test]
async fn latest_for_checkin_returns_newest_or_none() {
    let db = TestDb::create().await;
    let checkin = Uuid::new_v4();

    assert!(adjustments::latest_for_checkin(&db.pool, checkin).await.unwrap().is_none());

    let _older = pending_suggestion(&db, checkin).await;
    let newer = pending_suggestion(&db, checkin).await;

    let latest = adjustments::latest_for_checkin(&db.pool, checkin)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.id, newer.id);

    db.cleanup().await;
}

#[tokio::test]
async fn transition_only_from_expected_status() {
    let db = TestDb::create().await;
    let row = pending_suggestion(&db, Uuid::new_v4()).await;

    let approved = adjustments::transition_status(
        &db.pool,
        row.id,
        AdjustmentStatus::Pending,
        AdjustmentStatus::Approved,
        Some("dra.ana"),
    )
    .await
    .unwrap()
    .expect("pending row should transition");
    assert_eq!(approved.status, AdjustmentStatus::Approved);
    assert_eq!(approved.reviewed_by.as_deref(), Some("dra.ana"));
    assert!(approved.reviewed_at.is_some());

    let again = adjustments::transition_status(
        &db.pool,
        row.id,
        AdjustmentStatus::Pending,
        AdjustmentStatus::Rejected,
        None,
    )
    .await
    .unwrap();
    assert!(again.is_none(), "approved is terminal");

    let unchanged = adjustments::get_adjustment(&db.pool, row.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, AdjustmentStatus::Approved);

    db.cleanup().await;
}

#[tokio::test]
async fn feedback_text_update() {
    let db = TestDb::create().await;
    let row = pending_suggestion(&db, Uuid::new_v4()).await;

    let updated = adjustments::update_feedback_text(&db.pool, row.id, "Texto revisado")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.feedback_text, "Texto revisado");
    assert_eq!(updated.status, AdjustmentStatus::Pending);

    let missing = adjustments::update_feedback_text(&db.pool, Uuid::new_v4(), "x")
        .await
        .unwrap();
    assert!(missing.is_none());

    db.cleanup().await;
}
