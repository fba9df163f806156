//! Database query functions for the `nutrition_plans` table, plus the
//! joined read that assembles a [`PlanWithMeals`].

use std::collections::HashMap;

use anyhow::{Context, Result};
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::models::{Food, MealWithFoods, NutritionPlan, PlanStatus, PlanWithMeals};
use crate::queries::{foods, guidelines, meals};

/// Aggregate macro totals for a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MacroTotals {
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fats: Option<f64>,
}

impl MacroTotals {
    pub fn of(plan: &NutritionPlan) -> Self {
        Self {
            calories: plan.total_calories,
            protein: plan.total_protein,
            carbs: plan.total_carbs,
            fats: plan.total_fats,
        }
    }
}

/// Fields for a new plan row.
#[derive(Debug, Clone)]
pub struct NewPlan {
    pub patient_id: Uuid,
    pub name: String,
    pub status: PlanStatus,
    pub totals: MacroTotals,
    pub notes: Option<String>,
}

/// Partial update of a plan. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct PlanUpdate {
    pub name: Option<String>,
    pub notes: Option<String>,
    pub totals: MacroTotals,
}

/// Insert a new plan row.
pub async fn insert_plan<'e, E: PgExecutor<'e>>(exec: E, new: &NewPlan) -> Result<NutritionPlan> {
    let plan = sqlx::query_as::<_, NutritionPlan>(
        "INSERT INTO nutrition_plans \
             (patient_id, name, status, total_calories, total_protein, total_carbs, total_fats, notes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING *",
    )
    .bind(new.patient_id)
    .bind(&new.name)
    .bind(new.status)
    .bind(new.totals.calories)
    .bind(new.totals.protein)
    .bind(new.totals.carbs)
    .bind(new.totals.fats)
    .bind(&new.notes)
    .fetch_one(exec)
    .await
    .context("failed to insert plan")?;

    Ok(plan)
}

/// Fetch a plan row by ID.
pub async fn get_plan<'e, E: PgExecutor<'e>>(exec: E, id: Uuid) -> Result<Option<NutritionPlan>> {
    let plan = sqlx::query_as::<_, NutritionPlan>("SELECT * FROM nutrition_plans WHERE id = $1")
        .bind(id)
        .fetch_optional(exec)
        .await
        .context("failed to fetch plan")?;

    Ok(plan)
}

/// List a patient's plans, newest first.
pub async fn list_plans_for_patient<'e, E: PgExecutor<'e>>(
    exec: E,
    patient_id: Uuid,
) -> Result<Vec<NutritionPlan>> {
    let plans = sqlx::query_as::<_, NutritionPlan>(
        "SELECT * FROM nutrition_plans WHERE patient_id = $1 ORDER BY created_at DESC, id",
    )
    .bind(patient_id)
    .fetch_all(exec)
    .await
    .context("failed to list plans for patient")?;

    Ok(plans)
}

/// Fetch a plan with its meals (each with foods) and guidelines.
pub async fn get_plan_with_meals(conn: &mut PgConnection, id: Uuid) -> Result<Option<PlanWithMeals>> {
    let Some(plan) = get_plan(&mut *conn, id).await? else {
        return Ok(None);
    };

    let meal_rows = meals::list_meals_for_plan(&mut *conn, id).await?;
    let food_rows = foods::list_foods_for_plan(&mut *conn, id).await?;
    let guideline_rows = guidelines::list_guidelines_for_plan(&mut *conn, id).await?;

    let mut by_meal: HashMap<Uuid, Vec<Food>> = HashMap::new();
    for food in food_rows {
        by_meal.entry(food.meal_id).or_default().push(food);
    }

    let meals = meal_rows
        .into_iter()
        .map(|meal| {
            let foods = by_meal.remove(&meal.id).unwrap_or_default();
            MealWithFoods { meal, foods }
        })
        .collect();

    Ok(Some(PlanWithMeals {
        plan,
        meals,
        guidelines: guideline_rows,
    }))
}

/// Apply a partial update and bump `updated_at`.
pub async fn update_plan<'e, E: PgExecutor<'e>>(
    exec: E,
    id: Uuid,
    update: &PlanUpdate,
) -> Result<NutritionPlan> {
    let plan = sqlx::query_as::<_, NutritionPlan>(
        "UPDATE nutrition_plans SET \
             name = COALESCE($2, name), \
             notes = COALESCE($3, notes), \
             total_calories = COALESCE($4, total_calories), \
             total_protein = COALESCE($5, total_protein), \
             total_carbs = COALESCE($6, total_carbs), \
             total_fats = COALESCE($7, total_fats), \
             updated_at = now() \
         WHERE id = $1 \
         RETURNING *",
    )
    .bind(id)
    .bind(&update.name)
    .bind(&update.notes)
    .bind(update.totals.calories)
    .bind(update.totals.protein)
    .bind(update.totals.carbs)
    .bind(update.totals.fats)
    .fetch_optional(exec)
    .await
    .context("failed to update plan")?;

    plan.with_context(|| format!("plan {id} not found"))
}

/// Overwrite the aggregate macro totals. `None` fields are kept.
pub async fn update_plan_totals<'e, E: PgExecutor<'e>>(
    exec: E,
    id: Uuid,
    totals: MacroTotals,
) -> Result<NutritionPlan> {
    update_plan(
        exec,
        id,
        &PlanUpdate {
            totals,
            ..PlanUpdate::default()
        },
    )
    .await
}

/// Release a plan: `draft -> active`, setting the release flags and
/// `released_at`.
///
/// Fails if the plan does not exist or is not a draft.
pub async fn release_plan(conn: &mut PgConnection, id: Uuid) -> Result<NutritionPlan> {
    let plan = sqlx::query_as::<_, NutritionPlan>(
        "UPDATE nutrition_plans \
         SET status = 'active', is_released = TRUE, active = TRUE, \
             released_at = now(), updated_at = now() \
         WHERE id = $1 AND status = 'draft' \
         RETURNING *",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .context("failed to release plan")?;

    match plan {
        Some(p) => Ok(p),
        None => match get_plan(&mut *conn, id).await? {
            None => anyhow::bail!("plan {id} not found"),
            Some(p) => anyhow::bail!(
                "plan {id} cannot be released: current status is {} (must be draft)",
                p.status
            ),
        },
    }
}

/// Delete a plan. Meals, foods, guidelines and suggestions referencing it
/// are removed by the cascading foreign keys.
pub async fn delete_plan<'e, E: PgExecutor<'e>>(exec: E, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM nutrition_plans WHERE id = $1")
        .bind(id)
        .execute(exec)
        .await
        .context("failed to delete plan")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("plan {id} not found");
    }

    Ok(())
}
