//! Plan TOML parser with validation.
//!
//! Parses a plan file into a [`PlanToml`] and validates:
//! - The plan and every meal, food and guideline have a non-blank name/title.
//! - Meal names are unique after name normalization.
//! - Quantities and macro values are finite and not negative.

use std::collections::HashSet;

use thiserror::Error;

use super::toml_format::PlanToml;
use crate::matching::normalize_name;

#[derive(Debug, Error)]
pub enum PlanParseError {
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("plan name must not be empty")]
    EmptyPlanName,

    #[error("plan must contain at least one meal")]
    NoMeals,

    #[error("meal #{0} has an empty name")]
    EmptyMealName(usize),

    #[error("duplicate meal name: {0:?}")]
    DuplicateMealName(String),

    #[error("food #{index} in meal {meal:?} has an empty name")]
    EmptyFoodName { meal: String, index: usize },

    #[error("invalid {field} {value} for {item:?} (must be a non-negative number)")]
    InvalidNumber {
        item: String,
        field: &'static str,
        value: f64,
    },

    #[error("guideline #{0} has an empty title")]
    EmptyGuidelineTitle(usize),
}

/// Parse and validate a plan file.
pub fn parse_plan_toml(content: &str) -> Result<PlanToml, PlanParseError> {
    let plan: PlanToml = toml::from_str(content)?;
    validate(&plan)?;
    Ok(plan)
}

fn validate(plan: &PlanToml) -> Result<(), PlanParseError> {
    if plan.plan.name.trim().is_empty() {
        return Err(PlanParseError::EmptyPlanName);
    }
    if plan.meals.is_empty() {
        return Err(PlanParseError::NoMeals);
    }

    let meta = &plan.plan;
    check_macros(
        &meta.name,
        [meta.calories, meta.protein, meta.carbs, meta.fats],
    )?;

    let mut seen = HashSet::new();
    for (i, meal) in plan.meals.iter().enumerate() {
        if meal.name.trim().is_empty() {
            return Err(PlanParseError::EmptyMealName(i + 1));
        }
        // Two meals that normalize alike could never be told apart when
        // reconciling model output.
        if !seen.insert(normalize_name(&meal.name)) {
            return Err(PlanParseError::DuplicateMealName(meal.name.clone()));
        }
        check_macros(
            &meal.name,
            [meal.calories, meal.protein, meal.carbs, meal.fats],
        )?;

        for (j, food) in meal.foods.iter().enumerate() {
            if food.name.trim().is_empty() {
                return Err(PlanParseError::EmptyFoodName {
                    meal: meal.name.clone(),
                    index: j + 1,
                });
            }
            check_number(&food.name, "quantity", food.quantity)?;
            check_macros(
                &food.name,
                [food.calories, food.protein, food.carbs, food.fats],
            )?;
        }
    }

    for (i, g) in plan.guidelines.iter().enumerate() {
        if g.title.trim().is_empty() {
            return Err(PlanParseError::EmptyGuidelineTitle(i + 1));
        }
    }

    Ok(())
}

fn check_macros(item: &str, values: [Option<f64>; 4]) -> Result<(), PlanParseError> {
    const FIELDS: [&str; 4] = ["calories", "protein", "carbs", "fats"];
    for (field, value) in FIELDS.into_iter().zip(values) {
        if let Some(v) = value {
            check_number(item, field, v)?;
        }
    }
    Ok(())
}

fn check_number(item: &str, field: &'static str, value: f64) -> Result<(), PlanParseError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(PlanParseError::InvalidNumber {
            item: item.to_owned(),
            field,
            value,
        })
    }
}
