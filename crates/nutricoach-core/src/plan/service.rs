//! Plan service layer.
//!
//! Importing a plan file, resolving which plan a patient is currently on,
//! and duplicating a plan into a fresh draft. Every multi-row write runs on
//! the caller's connection so it can be part of a larger transaction.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use nutricoach_db::models::{MealWithFoods, NutritionPlan, PlanStatus, PlanWithMeals};
use nutricoach_db::queries::foods::{self, NewFood};
use nutricoach_db::queries::guidelines::{self, NewGuideline};
use nutricoach_db::queries::meals::{self, NewMeal};
use nutricoach_db::queries::plans::{self, MacroTotals, NewPlan};

use super::toml_format::PlanToml;
use crate::error::OperationError;

/// Name given to a duplicated plan: `"<name> - Ajuste dd/mm/yyyy"`.
pub fn duplicate_name(name: &str, date: NaiveDate) -> String {
    format!("{name} - Ajuste {}", date.format("%d/%m/%Y"))
}

/// Pick the plan a patient is on: the newest `active` plan, otherwise the
/// most recently created plan of any status. `None` when the patient has
/// no plans.
pub async fn resolve_active_plan(
    conn: &mut PgConnection,
    patient_id: Uuid,
) -> Result<Option<NutritionPlan>> {
    let mut candidates = plans::list_plans_for_patient(&mut *conn, patient_id).await?;

    if let Some(pos) = candidates.iter().position(|p| p.status == PlanStatus::Active) {
        return Ok(Some(candidates.swap_remove(pos)));
    }

    let newest = candidates.into_iter().next();
    if let Some(plan) = &newest {
        warn!(
            patient_id = %patient_id,
            plan_id = %plan.id,
            status = %plan.status,
            "patient has no active plan, falling back to the most recent one"
        );
    }
    Ok(newest)
}

/// Recreate `source` as a new `draft` plan: every meal, food and guideline
/// is copied in order under fresh IDs.
///
/// Runs on `conn`; the caller owns the transaction boundary.
pub async fn duplicate_plan(
    conn: &mut PgConnection,
    source: &PlanWithMeals,
    date: NaiveDate,
) -> Result<PlanWithMeals> {
    let plan = plans::insert_plan(
        &mut *conn,
        &NewPlan {
            patient_id: source.plan.patient_id,
            name: duplicate_name(&source.plan.name, date),
            status: PlanStatus::Draft,
            totals: MacroTotals::of(&source.plan),
            notes: source.plan.notes.clone(),
        },
    )
    .await
    .context("failed to create duplicate plan")?;

    let mut copied_meals = Vec::with_capacity(source.meals.len());
    for m in &source.meals {
        let meal = meals::insert_meal(&mut *conn, &NewMeal::copy_of(&m.meal, plan.id)).await?;

        let mut copied_foods = Vec::with_capacity(m.foods.len());
        for f in &m.foods {
            copied_foods.push(foods::insert_food(&mut *conn, &NewFood::copy_of(f, meal.id)).await?);
        }
        copied_meals.push(MealWithFoods {
            meal,
            foods: copied_foods,
        });
    }

    let mut copied_guidelines = Vec::with_capacity(source.guidelines.len());
    for g in &source.guidelines {
        copied_guidelines
            .push(guidelines::insert_guideline(&mut *conn, &NewGuideline::copy_of(g, plan.id)).await?);
    }

    debug!(
        source_plan_id = %source.plan.id,
        plan_id = %plan.id,
        meals = copied_meals.len(),
        "plan duplicated"
    );

    Ok(PlanWithMeals {
        plan,
        meals: copied_meals,
        guidelines: copied_guidelines,
    })
}

/// Create a plan for `patient_id` from a parsed and validated [`PlanToml`].
///
/// All rows are inserted inside one transaction.
pub async fn import_plan(
    pool: &PgPool,
    patient_id: Uuid,
    plan_toml: &PlanToml,
) -> Result<PlanWithMeals> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let meta = &plan_toml.plan;
    let plan = plans::insert_plan(
        &mut *tx,
        &NewPlan {
            patient_id,
            name: meta.name.clone(),
            status: PlanStatus::Draft,
            totals: MacroTotals {
                calories: meta.calories,
                protein: meta.protein,
                carbs: meta.carbs,
                fats: meta.fats,
            },
            notes: meta.notes.clone(),
        },
    )
    .await?;

    let mut created_meals = Vec::with_capacity(plan_toml.meals.len());
    for (order, m) in plan_toml.meals.iter().enumerate() {
        let meal = meals::insert_meal(
            &mut *tx,
            &NewMeal {
                plan_id: plan.id,
                meal_name: m.name.clone(),
                meal_type: m.meal_type.clone(),
                meal_order: order as i32,
                suggested_time: m.time.clone(),
                calories: m.calories,
                protein: m.protein,
                carbs: m.carbs,
                fats: m.fats,
                instructions: m.instructions.clone(),
            },
        )
        .await?;

        let mut created_foods = Vec::with_capacity(m.foods.len());
        for (item_order, f) in m.foods.iter().enumerate() {
            let food = foods::insert_food(
                &mut *tx,
                &NewFood {
                    meal_id: meal.id,
                    food_name: f.name.clone(),
                    quantity: f.quantity,
                    unit: f.unit.clone(),
                    calories: f.calories,
                    protein: f.protein,
                    carbs: f.carbs,
                    fats: f.fats,
                    item_order: item_order as i32,
                    notes: f.notes.clone(),
                },
            )
            .await?;
            created_foods.push(food);
        }
        created_meals.push(MealWithFoods {
            meal,
            foods: created_foods,
        });
    }

    let mut created_guidelines = Vec::with_capacity(plan_toml.guidelines.len());
    for g in &plan_toml.guidelines {
        let guideline = guidelines::insert_guideline(
            &mut *tx,
            &NewGuideline {
                plan_id: plan.id,
                guideline_type: g.guideline_type.clone(),
                title: g.title.clone(),
                content: g.content.clone(),
                priority: g.priority,
            },
        )
        .await?;
        created_guidelines.push(guideline);
    }

    tx.commit().await.context("failed to commit transaction")?;

    info!(
        plan_id = %plan.id,
        patient_id = %patient_id,
        meals = created_meals.len(),
        "plan imported"
    );

    Ok(PlanWithMeals {
        plan,
        meals: created_meals,
        guidelines: created_guidelines,
    })
}

/// Fetch a plan with meals, foods and guidelines joined in.
pub async fn get_plan_with_meals(pool: &PgPool, plan_id: Uuid) -> Result<Option<PlanWithMeals>> {
    let mut conn = pool.acquire().await.context("failed to acquire connection")?;
    plans::get_plan_with_meals(&mut conn, plan_id).await
}

/// Release a draft plan.
pub async fn release_plan(pool: &PgPool, plan_id: Uuid) -> Result<NutritionPlan, OperationError> {
    let mut conn = pool.acquire().await.context("failed to acquire connection")?;
    let plan = release_draft(&mut conn, plan_id).await?;
    info!(plan_id = %plan_id, "plan released");
    Ok(plan)
}

/// Release `plan_id` on `conn`, telling a missing plan apart from one that
/// is no longer a draft.
pub async fn release_draft(
    conn: &mut PgConnection,
    plan_id: Uuid,
) -> Result<NutritionPlan, OperationError> {
    let current = plans::get_plan(&mut *conn, plan_id)
        .await?
        .ok_or(OperationError::not_found("plan", plan_id))?;
    if current.status != PlanStatus::Draft {
        return Err(OperationError::WrongStatus {
            kind: "plan",
            id: plan_id,
            action: "released".into(),
            current: current.status.to_string(),
            required: PlanStatus::Draft.to_string(),
        });
    }
    Ok(plans::release_plan(conn, plan_id).await?)
}
