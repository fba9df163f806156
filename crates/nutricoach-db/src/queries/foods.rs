//! Database query functions for the `meal_foods` table.

use anyhow::{Context, Result};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::Food;

/// Fields for a new food row.
#[derive(Debug, Clone, Default)]
pub struct NewFood {
    pub meal_id: Uuid,
    pub food_name: String,
    pub quantity: f64,
    pub unit: String,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fats: Option<f64>,
    pub item_order: i32,
    pub notes: Option<String>,
}

impl NewFood {
    /// A copy of `food` re-parented under `meal_id`.
    pub fn copy_of(food: &Food, meal_id: Uuid) -> Self {
        Self {
            meal_id,
            food_name: food.food_name.clone(),
            quantity: food.quantity,
            unit: food.unit.clone(),
            calories: food.calories,
            protein: food.protein,
            carbs: food.carbs,
            fats: food.fats,
            item_order: food.item_order,
            notes: food.notes.clone(),
        }
    }
}

/// Insert a food row.
pub async fn insert_food<'e, E: PgExecutor<'e>>(exec: E, new: &NewFood) -> Result<Food> {
    let food = sqlx::query_as::<_, Food>(
        "INSERT INTO meal_foods \
             (meal_id, food_name, quantity, unit, calories, protein, carbs, fats, item_order, notes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         RETURNING *",
    )
    .bind(new.meal_id)
    .bind(&new.food_name)
    .bind(new.quantity)
    .bind(&new.unit)
    .bind(new.calories)
    .bind(new.protein)
    .bind(new.carbs)
    .bind(new.fats)
    .bind(new.item_order)
    .bind(&new.notes)
    .fetch_one(exec)
    .await
    .with_context(|| format!("failed to insert food {:?}", new.food_name))?;

    Ok(food)
}

/// Fetch a food row by ID.
pub async fn get_food<'e, E: PgExecutor<'e>>(exec: E, id: Uuid) -> Result<Option<Food>> {
    let food = sqlx::query_as::<_, Food>("SELECT * FROM meal_foods WHERE id = $1")
        .bind(id)
        .fetch_optional(exec)
        .await
        .context("failed to fetch food")?;

    Ok(food)
}

/// List the foods of a single meal in display order.
pub async fn list_foods_for_meal<'e, E: PgExecutor<'e>>(exec: E, meal_id: Uuid) -> Result<Vec<Food>> {
    let foods = sqlx::query_as::<_, Food>(
        "SELECT * FROM meal_foods WHERE meal_id = $1 ORDER BY item_order ASC, created_at ASC",
    )
    .bind(meal_id)
    .fetch_all(exec)
    .await
    .context("failed to list foods for meal")?;

    Ok(foods)
}

/// List every food of a plan, ordered by meal then display order.
pub async fn list_foods_for_plan<'e, E: PgExecutor<'e>>(exec: E, plan_id: Uuid) -> Result<Vec<Food>> {
    let foods = sqlx::query_as::<_, Food>(
        "SELECT f.* FROM meal_foods f \
         JOIN plan_meals m ON m.id = f.meal_id \
         WHERE m.plan_id = $1 \
         ORDER BY m.meal_order ASC, f.item_order ASC, f.created_at ASC",
    )
    .bind(plan_id)
    .fetch_all(exec)
    .await
    .context("failed to list foods for plan")?;

    Ok(foods)
}

/// Update quantity, unit and calories of a food. `None` keeps the column.
/// Returns the number of rows updated.
pub async fn update_food_amount<'e, E: PgExecutor<'e>>(
    exec: E,
    id: Uuid,
    quantity: Option<f64>,
    unit: Option<&str>,
    calories: Option<f64>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE meal_foods SET \
             quantity = COALESCE($2, quantity), \
             unit = COALESCE($3, unit), \
             calories = COALESCE($4, calories) \
         WHERE id = $1",
    )
    .bind(id)
    .bind(quantity)
    .bind(unit)
    .bind(calories)
    .execute(exec)
    .await
    .context("failed to update food amount")?;

    Ok(result.rows_affected())
}

/// Delete a food row. Returns the number of rows removed.
pub async fn delete_food<'e, E: PgExecutor<'e>>(exec: E, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM meal_foods WHERE id = $1")
        .bind(id)
        .execute(exec)
        .await
        .context("failed to delete food")?;

    Ok(result.rows_affected())
}

/// The display order a food appended to `meal_id` should get.
pub async fn next_item_order<'e, E: PgExecutor<'e>>(exec: E, meal_id: Uuid) -> Result<i32> {
    let next: i32 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(item_order) + 1, 0) FROM meal_foods WHERE meal_id = $1",
    )
    .bind(meal_id)
    .fetch_one(exec)
    .await
    .context("failed to compute next food order")?;

    Ok(next)
}
