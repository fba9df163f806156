//! Database query functions for the `plan_meals` table.

use anyhow::{Context, Result};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::Meal;

/// Fields for a new meal row.
#[derive(Debug, Clone, Default)]
pub struct NewMeal {
    pub plan_id: Uuid,
    pub meal_name: String,
    pub meal_type: Option<String>,
    pub meal_order: i32,
    pub suggested_time: Option<String>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fats: Option<f64>,
    pub instructions: Option<String>,
}

impl NewMeal {
    /// A copy of `meal` re-parented under `plan_id`.
    pub fn copy_of(meal: &Meal, plan_id: Uuid) -> Self {
        Self {
            plan_id,
            meal_name: meal.meal_name.clone(),
            meal_type: meal.meal_type.clone(),
            meal_order: meal.meal_order,
            suggested_time: meal.suggested_time.clone(),
            calories: meal.calories,
            protein: meal.protein,
            carbs: meal.carbs,
            fats: meal.fats,
            instructions: meal.instructions.clone(),
        }
    }
}

/// Insert a meal row.
pub async fn insert_meal<'e, E: PgExecutor<'e>>(exec: E, new: &NewMeal) -> Result<Meal> {
    let meal = sqlx::query_as::<_, Meal>(
        "INSERT INTO plan_meals \
             (plan_id, meal_name, meal_type, meal_order, suggested_time, \
              calories, protein, carbs, fats, instructions) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         RETURNING *",
    )
    .bind(new.plan_id)
    .bind(&new.meal_name)
    .bind(&new.meal_type)
    .bind(new.meal_order)
    .bind(&new.suggested_time)
    .bind(new.calories)
    .bind(new.protein)
    .bind(new.carbs)
    .bind(new.fats)
    .bind(&new.instructions)
    .fetch_one(exec)
    .await
    .with_context(|| format!("failed to insert meal {:?}", new.meal_name))?;

    Ok(meal)
}

/// List the meals of a plan in display order.
pub async fn list_meals_for_plan<'e, E: PgExecutor<'e>>(exec: E, plan_id: Uuid) -> Result<Vec<Meal>> {
    let meals = sqlx::query_as::<_, Meal>(
        "SELECT * FROM plan_meals WHERE plan_id = $1 ORDER BY meal_order ASC, created_at ASC",
    )
    .bind(plan_id)
    .fetch_all(exec)
    .await
    .context("failed to list meals for plan")?;

    Ok(meals)
}

/// Delete a meal and (by cascade) its foods. Returns the number of rows removed.
pub async fn delete_meal<'e, E: PgExecutor<'e>>(exec: E, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM plan_meals WHERE id = $1")
        .bind(id)
        .execute(exec)
        .await
        .context("failed to delete meal")?;

    Ok(result.rows_affected())
}
