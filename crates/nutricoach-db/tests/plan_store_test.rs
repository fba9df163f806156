//! Integration tests for the plan store: plans, meals, foods, guidelines.

use nutricoach_db::models::PlanStatus;
use nutricoach_db::queries::foods::{self, NewFood};
use nutricoach_db::queries::meals;
use nutricoach_db::queries::plans::{self, MacroTotals, NewPlan, PlanUpdate};
use nutricoach_test_utils::{TestDb, seed_plan};
use uuid::Uuid;

fn draft(patient_id: Uuid, name: &str) -> NewPlan {
    NewPlan {
        patient_id,
        name: name.into(),
        status: PlanStatus::Draft,
        totals: MacroTotals::default(),
        notes: None,
    }
}

#[tokio::test]
async fn insert_and_get_plan() {
    let db = TestDb::create().await;
    let patient = Uuid::new_v4();

    let plan = plans::insert_plan(&db.pool, &draft(patient, "Plano Inicial"))
        .await
        .expect("insert_plan should succeed");

    assert_eq!(plan.name, "Plano Inicial");
    assert_eq!(plan.status, PlanStatus::Draft);
    assert!(!plan.is_released);
    assert!(!plan.active);
    assert!(plan.released_at.is_none());

    let fetched = plans::get_plan(&db.pool, plan.id)
        .await
        .expect("get_plan should succeed")
        .expect("plan should exist");
    assert_eq!(fetched.id, plan.id);

    assert!(plans::get_plan(&db.pool, Uuid::new_v4()).await.unwrap().is_none());

    db.cleanup().await;
}

#[tokio::test]
async fn list_plans_for_patient_is_scoped_and_newest_first() {
    let db = TestDb::create().await;
    let patient = Uuid::new_v4();

    let first = plans::insert_plan(&db.pool, &draft(patient, "Primeiro")).await.unwrap();
    let second = plans::insert_plan(&db.pool, &draft(patient, "Segundo")).await.unwrap();
    plans::insert_plan(&db.pool, &draft(Uuid::new_v4(), "Outro paciente"))
        .await
        .unwrap();

    let listed = plans::list_plans_for_patient(&db.pool, patient).await.unwrap();
    let ids: Vec<Uuid> = listed.iter().map(|p| p.id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&first.id));
    assert!(ids.contains(&second.id));
    assert!(listed[0].created_at >= listed[1].created_at);

    db.cleanup().await;
}

#[tokio::test]
async fn get_plan_with_meals_joins_foods_and_guidelines() {
    let db = TestDb::create().await;
    let seeded = seed_plan(&db.pool, Uuid::new_v4(), PlanStatus::Active).await;

    let names: Vec<&str> = seeded.meals.iter().map(|m| m.meal.meal_name.as_str()).collect();
    assert_eq!(names, ["Café da Manhã", "Almoço", "Lanche Tarde"]);

    let almoco = &seeded.meals[1];
    let foods: Vec<&str> = almoco.foods.iter().map(|f| f.food_name.as_str()).collect();
    assert_eq!(foods, ["Arroz branco", "Feijão carioca", "Frango grelhado"]);
    assert!(almoco.foods.iter().all(|f| f.meal_id == almoco.meal.id));

    assert_eq!(seeded.food_count(), 7);
    assert_eq!(seeded.guidelines.len(), 1);
    assert_eq!(seeded.guidelines[0].title, "Água");

    let mut conn = db.pool.acquire().await.unwrap();
    let missing = plans::get_plan_with_meals(&mut conn, Uuid::new_v4()).await.unwrap();
    assert!(missing.is_none());
    drop(conn);

    db.cleanup().await;
}

#[tokio::test]
async fn update_plan_keeps_unset_fields() {
    let db = TestDb::create().await;
    let seeded = seed_plan(&db.pool, Uuid::new_v4(), PlanStatus::Draft).await;

    let updated = plans::update_plan(
        &db.pool,
        seeded.plan.id,
        &PlanUpdate {
            notes: Some("revisar em 30 dias".into()),
            totals: MacroTotals {
                calories: Some(1700.0),
                ..MacroTotals::default()
            },
            ..PlanUpdate::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(updated.name, "Plano Base");
    assert_eq!(updated.notes.as_deref(), Some("revisar em 30 dias"));
    assert_eq!(updated.total_calories, Some(1700.0));
    assert_eq!(updated.total_protein, Some(130.0));
    assert!(updated.updated_at >= seeded.plan.updated_at);

    let err = plans::update_plan(&db.pool, Uuid::new_v4(), &PlanUpdate::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found"));

    db.cleanup().await;
}

#[tokio::test]
async fn release_moves_draft_to_active_once() {
    let db = TestDb::create().await;
    let plan = plans::insert_plan(&db.pool, &draft(Uuid::new_v4(), "Rascunho"))
        .await
        .unwrap();

    let mut conn = db.pool.acquire().await.unwrap();
    let released = plans::release_plan(&mut conn, plan.id).await.unwrap();
    assert_eq!(released.status, PlanStatus::Active);
    assert!(released.is_released);
    assert!(released.active);
    assert!(released.released_at.is_some());

    let err = plans::release_plan(&mut conn, plan.id).await.unwrap_err();
    assert!(err.to_string().contains("must be draft"), "{err}");

    let err = plans::release_plan(&mut conn, Uuid::new_v4()).await.unwrap_err();
    assert!(err.to_string().contains("not found"), "{err}");
    drop(conn);

    db.cleanup().await;
}

#[tokio::test]
async fn delete_plan_cascades() {
    let db = TestDb::create().await;
    let seeded = seed_plan(&db.pool, Uuid::new_v4(), PlanStatus::Draft).await;

    plans::delete_plan(&db.pool, seeded.plan.id).await.unwrap();

    let meals = meals::list_meals_for_plan(&db.pool, seeded.plan.id).await.unwrap();
    assert!(meals.is_empty());
    let foods = foods::list_foods_for_plan(&db.pool, seeded.plan.id).await.unwrap();
    assert!(foods.is_empty());
    let orphan: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM meal_foods")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(orphan, 0);

    let err = plans::delete_plan(&db.pool, seeded.plan.id).await.unwrap_err();
    assert!(err.to_string().contains("not found"));

    db.cleanup().await;
}

#[tokio::test]
async fn food_amount_update_keeps_unparsed_columns() {
    let db = TestDb::create().await;
    let seeded = seed_plan(&db.pool, Uuid::new_v4(), PlanStatus::Draft).await;
    let arroz = &seeded.meals[1].foods[0];

    let n = foods::update_food_amount(&db.pool, arroz.id, Some(80.0), None, Some(104.0))
        .await
        .unwrap();
    assert_eq!(n, 1);

    let after = foods::get_food(&db.pool, arroz.id).await.unwrap().unwrap();
    assert_eq!(after.quantity, 80.0);
    assert_eq!(after.unit, "g");
    assert_eq!(after.calories, Some(104.0));

    let n = foods::update_food_amount(&db.pool, Uuid::new_v4(), Some(1.0), None, None)
        .await
        .unwrap();
    assert_eq!(n, 0);

    db.cleanup().await;
}

#[tokio::test]
async fn next_item_order_appends_after_existing_foods() {
    let db = TestDb::create().await;
    let seeded = seed_plan(&db.pool, Uuid::new_v4(), PlanStatus::Draft).await;
    let almoco = &seeded.meals[1];

    let next = foods::next_item_order(&db.pool, almoco.meal.id).await.unwrap();
    assert_eq!(next, 3);

    let salada = foods::insert_food(
        &db.pool,
        &NewFood {
            meal_id: almoco.meal.id,
            food_name: "Salada verde".into(),
            quantity: 100.0,
            unit: "g".into(),
            item_order: next,
            ..NewFood::default()
        },
    )
    .await
    .unwrap();

    let listed = foods::list_foods_for_meal(&db.pool, almoco.meal.id).await.unwrap();
    assert_eq!(listed.last().map(|f| f.id), Some(salada.id));

    assert_eq!(foods::delete_food(&db.pool, salada.id).await.unwrap(), 1);
    assert_eq!(foods::delete_food(&db.pool, salada.id).await.unwrap(), 0);

    db.cleanup().await;
}

#[tokio::test]
async fn delete_meal_takes_its_foods() {
    let db = TestDb::create().await;
    let seeded = seed_plan(&db.pool, Uuid::new_v4(), PlanStatus::Draft).await;
    let almoco = &seeded.meals[1];
    assert!(!almoco.foods.is_empty());

    assert_eq!(meals::delete_meal(&db.pool, almoco.meal.id).await.unwrap(), 1);

    let left = foods::list_foods_for_meal(&db.pool, almoco.meal.id).await.unwrap();
    assert!(left.is_empty());
    let remaining = meals::list_meals_for_plan(&db.pool, seeded.plan.id).await.unwrap();
    assert_eq!(remaining.len(), seeded.meals.len() - 1);

    db.cleanup().await;
}
