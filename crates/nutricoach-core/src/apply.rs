//! Applying a parsed [`AdjustmentResponse`] to a (duplicated) plan.
//!
//! Names from the model are reconciled with [`crate::matching`], amounts are
//! read with [`crate::quantity`]. Every database edit runs in its own
//! savepoint: a failing statement is rolled back and logged, and the loop
//! moves on to the next edit. Misses are logged and counted, never fatal.

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::{Connection, PgConnection, Postgres, Transaction};
use tracing::{debug, info, warn};

use nutricoach_db::models::{Food, PlanWithMeals};
use nutricoach_db::queries::foods::{self, NewFood};
use nutricoach_db::queries::plans::{self, MacroTotals};

use crate::matching::{match_food, match_meal};
use crate::quantity::{ParsedValue, parse_food_value};
use crate::response::{AdjustmentResponse, ChangeAction, FoodChange, MacroChanges};

/// Value assumed for an added food the model gave no amount for.
pub const DEFAULT_ADDED_VALUE: &str = "100g";
const DEFAULT_ADDED_QUANTITY: f64 = 100.0;
const DEFAULT_UNIT: &str = "g";
/// Unit for an added food given as a bare count ("2 ovos").
pub const COUNT_UNIT: &str = "un";

/// What happened while applying one response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub foods_modified: u32,
    pub foods_added: u32,
    pub foods_removed: u32,
    /// Adjustment entries whose meal name matched nothing.
    pub meals_skipped: u32,
    /// Food changes whose food name matched nothing, or whose value could
    /// not be read.
    pub foods_skipped: u32,
    /// Edits rolled back because the statement failed.
    pub edits_failed: u32,
    pub totals_updated: bool,
    /// Human-readable description of every skipped or failed edit.
    pub warnings: Vec<String>,
}

impl ApplyReport {
    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }
}

/// Plan totals to write, or `None` when the model reported no non-zero
/// `after` value. Zero values leave the corresponding column untouched.
pub fn totals_update(changes: &MacroChanges) -> Option<MacroTotals> {
    let pick = |after: f64| (after > 0.0).then_some(after);
    let totals = MacroTotals {
        calories: pick(changes.calories.after),
        protein: pick(changes.protein.after),
        carbs: pick(changes.carbs.after),
        fats: pick(changes.fats.after),
    };
    (totals != MacroTotals::default()).then_some(totals)
}

/// Apply `response` to `plan`, which must already be persisted.
///
/// `conn` should be inside a transaction so that each edit's savepoint
/// nests in it. Only savepoint bookkeeping errors are returned; edit
/// failures are reported in the [`ApplyReport`].
pub async fn apply_adjustments(
    conn: &mut PgConnection,
    plan: &PlanWithMeals,
    response: &AdjustmentResponse,
) -> Result<ApplyReport> {
    let mut report = ApplyReport::default();
    let meal_names: Vec<&str> = plan.meals.iter().map(|m| m.meal.meal_name.as_str()).collect();

    // Working copy of each meal's foods so later changes see earlier ones.
    let mut meal_foods: Vec<Vec<Food>> = plan.meals.iter().map(|m| m.foods.clone()).collect();

    for adjustment in &response.adjustments {
        let Some(meal_idx) = match_meal(&adjustment.meal_name, &meal_names) else {
            report.meals_skipped += 1;
            report.warn(format!(
                "no meal matches {:?}; skipping {} change(s)",
                adjustment.meal_name,
                adjustment.changes.len()
            ));
            continue;
        };
        let meal = &plan.meals[meal_idx].meal;
        debug!(
            requested = %adjustment.meal_name,
            meal = %meal.meal_name,
            "meal matched"
        );

        for change in &adjustment.changes {
            let current = &mut meal_foods[meal_idx];
            match change.action {
                ChangeAction::Added => {
                    add_food(conn, meal.id, current, change, &mut report).await?;
                }
                ChangeAction::Modified | ChangeAction::Removed => {
                    let names: Vec<&str> = current.iter().map(|f| f.food_name.as_str()).collect();
                    let Some(food_idx) = match_food(&change.food_name, &names) else {
                        report.foods_skipped += 1;
                        report.warn(format!(
                            "no food in {:?} matches {:?}",
                            meal.meal_name, change.food_name
                        ));
                        continue;
                    };
                    if change.action == ChangeAction::Modified {
                        modify_food(conn, &mut current[food_idx], change, &mut report).await?;
                    } else {
                        let food_id = current[food_idx].id;
                        if remove_food(conn, &current[food_idx], &mut report).await? {
                            current.retain(|f| f.id != food_id);
                        }
                    }
                }
            }
        }
    }

    if let Some(totals) = totals_update(&response.macro_changes) {
        let mut sp = begin_savepoint(conn).await?;
        let outcome = plans::update_plan_totals(&mut *sp, plan.plan.id, totals).await;
        if finish(sp, outcome, &mut report, "update plan totals").await?.is_some() {
            report.totals_updated = true;
        }
    }

    info!(
        plan_id = %plan.plan.id,
        modified = report.foods_modified,
        added = report.foods_added,
        removed = report.foods_removed,
        meals_skipped = report.meals_skipped,
        foods_skipped = report.foods_skipped,
        failed = report.edits_failed,
        "adjustments applied"
    );

    Ok(report)
}

async fn add_food(
    conn: &mut PgConnection,
    meal_id: uuid::Uuid,
    current: &mut Vec<Food>,
    change: &FoodChange,
    report: &mut ApplyReport,
) -> Result<()> {
    let value = change.new_value.as_deref().unwrap_or(DEFAULT_ADDED_VALUE);
    let parsed = parse_food_value(value);
    let (quantity, unit) = match (parsed.quantity, parsed.unit.clone()) {
        (Some(q), Some(u)) => (q, u),
        (Some(q), None) => (q, COUNT_UNIT.to_owned()),
        (None, _) => {
            warn!(
                food = %change.food_name,
                value = %value,
                "no amount in added food; using {DEFAULT_ADDED_VALUE}"
            );
            (DEFAULT_ADDED_QUANTITY, DEFAULT_UNIT.to_owned())
        }
    };

    let mut sp = begin_savepoint(conn).await?;
    let outcome = async {
        let item_order = foods::next_item_order(&mut *sp, meal_id).await?;
        foods::insert_food(
            &mut *sp,
            &NewFood {
                meal_id,
                food_name: change.food_name.clone(),
                quantity,
                unit,
                calories: parsed.calories,
                item_order,
                notes: change.reason.clone(),
                ..NewFood::default()
            },
        )
        .await
    }
    .await;

    let label = format!("add {:?}", change.food_name);
    if let Some(food) = finish(sp, outcome, report, &label).await? {
        report.foods_added += 1;
        current.push(food);
    }
    Ok(())
}

async fn modify_food(
    conn: &mut PgConnection,
    food: &mut Food,
    change: &FoodChange,
    report: &mut ApplyReport,
) -> Result<()> {
    let parsed = change
        .new_value
        .as_deref()
        .map(parse_food_value)
        .unwrap_or_default();
    if parsed.is_empty() {
        report.foods_skipped += 1;
        report.warn(format!(
            "could not read an amount from {:?} for {:?}; left unchanged",
            change.new_value.as_deref().unwrap_or(""),
            food.food_name
        ));
        return Ok(());
    }
    if parsed.quantity.is_some() && parsed.unit.is_none() {
        debug!(
            food = %food.food_name,
            unit = %food.unit,
            value = change.new_value.as_deref().unwrap_or(""),
            "no unit given; keeping the current one"
        );
    }

    let mut sp = begin_savepoint(conn).await?;
    let outcome = foods::update_food_amount(
        &mut *sp,
        food.id,
        parsed.quantity,
        parsed.unit.as_deref(),
        parsed.calories,
    )
    .await;

    let label = format!("modify {:?}", food.food_name);
    if finish(sp, outcome, report, &label).await?.is_some() {
        report.foods_modified += 1;
        apply_parsed(food, &parsed);
    }
    Ok(())
}

/// Returns whether the row was deleted.
async fn remove_food(conn: &mut PgConnection, food: &Food, report: &mut ApplyReport) -> Result<bool> {
    let mut sp = begin_savepoint(conn).await?;
    let outcome = foods::delete_food(&mut *sp, food.id).await;

    let label = format!("remove {:?}", food.food_name);
    let removed = finish(sp, outcome, report, &label).await?.is_some();
    if removed {
        report.foods_removed += 1;
    }
    Ok(removed)
}

fn apply_parsed(food: &mut Food, parsed: &ParsedValue) {
    if let Some(q) = parsed.quantity {
        food.quantity = q;
    }
    if let Some(u) = &parsed.unit {
        food.unit.clone_from(u);
    }
    if parsed.calories.is_some() {
        food.calories = parsed.calories;
    }
}

async fn begin_savepoint(conn: &mut PgConnection) -> Result<Transaction<'_, Postgres>> {
    conn.begin().await.context("failed to open savepoint")
}

/// Commit the savepoint on success; roll it back and record the failure
/// otherwise.
async fn finish<T>(
    sp: Transaction<'_, Postgres>,
    outcome: Result<T>,
    report: &mut ApplyReport,
    label: &str,
) -> Result<Option<T>> {
    match outcome {
        Ok(value) => {
            sp.commit().await.context("failed to release savepoint")?;
            Ok(Some(value))
        }
        Err(e) => {
            sp.rollback()
                .await
                .context("failed to roll back savepoint")?;
            report.edits_failed += 1;
            report.warn(format!("{label} failed: {e:#}"));
            Ok(None)
        }
    }
}
