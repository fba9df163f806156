//! Integration tests for applying model adjustments to a stored plan.

use uuid::Uuid;

use nutricoach_core::apply::apply_adjustments;
use nutricoach_core::response::{AdjustmentResponse, parse_response};
use nutricoach_db::models::{PlanStatus, PlanWithMeals};
use nutricoach_db::queries::plans;
use nutricoach_test_utils::{TestDb, seed_plan};

async fn reload(db: &TestDb, plan_id: Uuid) -> PlanWithMeals {
    let mut conn = db.pool.acquire().await.unwrap();
    plans::get_plan_with_meals(&mut conn, plan_id).await.unwrap().unwrap()
}

fn response(json: serde_json::Value) -> AdjustmentResponse {
    parse_response(&json.to_string())
}

fn food<'a>(plan: &'a PlanWithMeals, meal: &str, food: &str) -> Option<&'a nutricoach_db::models::Food> {
    plan.meals
        .iter()
        .find(|m| m.meal.meal_name == meal)?
        .foods
        .iter()
        .find(|f| f.food_name == food)
}

#[tokio::test]
async fn reduce_to_80g() {
    let db = TestDb::create().await;
    let plan = seed_plan(&db.pool, Uuid::new_v4(), PlanStatus::Draft).await;

    let r = response(serde_json::json!({
        "adjustments": [{
            "meal_name": "almoço",
            "action": "modified",
            "changes": [{
                "action": "modified",
                "food_name": "Arroz",
                "old_value": "120g",
                "new_value": "reduzir para 80g"
            }]
        }]
    }));

    let mut tx = db.pool.begin().await.unwrap();
    let report = apply_adjustments(&mut tx, &plan, &r).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(report.foods_modified, 1);
    let after = reload(&db, plan.plan.id).await;
    let arroz = food(&after, "Almoço", "Arroz branco").unwrap();
    assert_eq!(arroz.quantity, 80.0);
    assert_eq!(arroz.unit, "g");

    db.cleanup().await;
}

#[tokio::test]
async fn lanche_da_tarde_matches_lanche_tarde() {
    let db = TestDb::create().await;
    let plan = seed_plan(&db.pool, Uuid::new_v4(), PlanStatus::Draft).await;

    let r = response(serde_json::json!({
        "adjustments": [{
            "meal_name": "Lanche da Tarde",
            "action": "modified",
            "reason": "fome à tarde",
            "changes": [
                { "action": "added", "food_name": "Castanha do Pará", "new_value": "15g · 100kcal", "reason": "mais saciedade" },
                { "action": "added", "food_name": "Chia" }
            ]
        }]
    }));

    let mut tx = db.pool.begin().await.unwrap();
    let report = apply_adjustments(&mut tx, &plan, &r).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(report.meals_skipped, 0);
    assert_eq!(report.foods_added, 2);

    let after = reload(&db, plan.plan.id).await;
    let castanha = food(&after, "Lanche Tarde", "Castanha do Pará").unwrap();
    assert_eq!(castanha.quantity, 15.0);
    assert_eq!(castanha.unit, "g");
    assert_eq!(castanha.calories, Some(100.0));
    assert_eq!(castanha.notes.as_deref(), Some("mais saciedade"));
    assert_eq!(castanha.item_order, 2);

    let chia = food(&after, "Lanche Tarde", "Chia").unwrap();
    assert_eq!(chia.quantity, 100.0);
    assert_eq!(chia.unit, "g");
    assert_eq!(chia.item_order, 3);

    db.cleanup().await;
}

#[tokio::test]
async fn loose_values_still_apply() {
    let db = TestDb::create().await;
    let plan = seed_plan(&db.pool, Uuid::new_v4(), PlanStatus::Draft).await;

    let r = response(serde_json::json!({
        "adjustments": [
            {
                "meal_name": "Almoço",
                "action": "modified",
                "changes": [
                    { "action": "modified", "food_name": "Arroz branco", "old_value": 120, "new_value": 60 },
                    { "action": "modified", "food_name": "Feijão carioca", "new_value": "80g para 50g" },
                    { "action": "swapped", "food_name": "Salada" }
                ]
            },
            { "meal_name": "Jantar", "action": "kept" },
            {
                "meal_name": "Lanche Tarde",
                "changes": [{ "action": "added", "food_name": "Ovo cozido", "new_value": "2 ovos" }]
            }
        ],
        "macro_changes": { "calories": { "before": 1850, "after": null } }
    }));
    assert_eq!(r.adjustments.len(), 2);

    let mut tx = db.pool.begin().await.unwrap();
    let report = apply_adjustments(&mut tx, &plan, &r).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(report.foods_modified, 2);
    assert_eq!(report.foods_added, 1);
    assert_eq!(report.meals_skipped, 0);
    assert!(!report.totals_updated);

    let after = reload(&db, plan.plan.id).await;
    let arroz = food(&after, "Almoço", "Arroz branco").unwrap();
    assert_eq!(arroz.quantity, 60.0);
    assert_eq!(arroz.unit, "g");
    assert_eq!(food(&after, "Almoço", "Feijão carioca").unwrap().quantity, 50.0);
    let ovo = food(&after, "Lanche Tarde", "Ovo cozido").unwrap();
    assert_eq!(ovo.quantity, 2.0);
    assert_eq!(ovo.unit, "un");
    assert_eq!(after.plan.total_calories, plan.plan.total_calories);

    db.cleanup().await;
}

#[tokio::test]
async fn removal_and_misses_are_counted() {
    let db = TestDb::create().await;
    let plan = seed_plan(&db.pool, Uuid::new_v4(), PlanStatus::Draft).await;

    let r = response(serde_json::json!({
        "adjustments": [
            {
                "meal_name": "Ceia",
                "action": "added",
                "changes": [{ "action": "added", "food_name": "Chá" }]
            },
            {
                "meal_name": "Café da manha",
                "action": "modified",
                "changes": [
                    { "action": "removed", "food_name": "Pão Integral" },
                    { "action": "removed", "food_name": "Pão integral" },
                    { "action": "modified", "food_name": "Ovo mexido", "new_value": "manter" },
                    { "action": "modified", "food_name": "Tapioca", "new_value": "1 unidade" }
                ]
            }
        ]
    }));

    let mut tx = db.pool.begin().await.unwrap();
    let report = apply_adjustments(&mut tx, &plan, &r).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(report.meals_skipped, 1);
    assert_eq!(report.foods_removed, 1);
    // Second removal (already gone), unreadable value, unknown food.
    assert_eq!(report.foods_skipped, 3);
    assert_eq!(report.warnings.len(), 4);

    let after = reload(&db, plan.plan.id).await;
    assert!(food(&after, "Café da Manhã", "Pão integral").is_none());
    let ovo = food(&after, "Café da Manhã", "Ovo mexido").unwrap();
    assert_eq!(ovo.quantity, 2.0);
    assert_eq!(after.food_count(), plan.food_count() - 1);

    db.cleanup().await;
}

#[tokio::test]
async fn failed_edit_is_rolled_back_and_others_apply() {
    let db = TestDb::create().await;
    let plan = seed_plan(&db.pool, Uuid::new_v4(), PlanStatus::Draft).await;

    sqlx::query("ALTER TABLE meal_foods ADD CONSTRAINT test_quantity_cap CHECK (quantity < 1000)")
        .execute(&db.pool)
        .await
        .unwrap();

    let r = response(serde_json::json!({
        "adjustments": [{
            "meal_name": "Almoço",
            "action": "modified",
            "changes": [
                { "action": "modified", "food_name": "Arroz branco", "new_value": "5000g" },
                { "action": "modified", "food_name": "Feijão carioca", "new_value": "100g" }
            ]
        }],
        "macro_changes": {
            "calories": { "before": 1850, "after": 1750 },
            "protein": { "before": 130, "after": 0 }
        }
    }));

    let mut tx = db.pool.begin().await.unwrap();
    let report = apply_adjustments(&mut tx, &plan, &r).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(report.edits_failed, 1);
    assert_eq!(report.foods_modified, 1);
    assert!(report.totals_updated);

    let after = reload(&db, plan.plan.id).await;
    assert_eq!(food(&after, "Almoço", "Arroz branco").unwrap().quantity, 120.0);
    assert_eq!(food(&after, "Almoço", "Feijão carioca").unwrap().quantity, 100.0);
    assert_eq!(after.plan.total_calories, Some(1750.0));
    assert_eq!(after.plan.total_protein, Some(130.0));

    db.cleanup().await;
}

#[tokio::test]
async fn empty_response_changes_nothing() {
    let db = TestDb::create().await;
    let plan = seed_plan(&db.pool, Uuid::new_v4(), PlanStatus::Draft).await;

    let fallback = AdjustmentResponse::fallback("texto livre");
    let mut tx = db.pool.begin().await.unwrap();
    let report = apply_adjustments(&mut tx, &plan, &fallback).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(report, Default::default());
    let after = reload(&db, plan.plan.id).await;
    assert_eq!(after.food_count(), plan.food_count());
    assert_eq!(after.plan.total_calories, plan.plan.total_calories);

    db.cleanup().await;
}
