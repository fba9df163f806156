//! TOML format types for plan import files.
//!
//! ```toml
//! [plan]
//! name = "Plano Base"
//! calories = 1850
//!
//! [[meals]]
//! name = "Almoço"
//! time = "12:30"
//!
//! [[meals.foods]]
//! name = "Arroz branco"
//! quantity = 120
//!
//! [[guidelines]]
//! title = "Água"
//! content = "35 ml por kg"
//! ```

use serde::{Deserialize, Serialize};

/// Top-level structure of a plan file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanToml {
    pub plan: PlanMeta,
    #[serde(default)]
    pub meals: Vec<MealToml>,
    #[serde(default)]
    pub guidelines: Vec<GuidelineToml>,
}

/// Plan-level metadata in `[plan]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fats: Option<f64>,
}

/// A `[[meals]]` entry. Display order follows file order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MealToml {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub meal_type: Option<String>,
    /// Suggested time, e.g. `"07:30"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fats: Option<f64>,
    #[serde(default)]
    pub foods: Vec<FoodToml>,
}

/// A `[[meals.foods]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoodToml {
    pub name: String,
    pub quantity: f64,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fats: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A `[[guidelines]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuidelineToml {
    #[serde(default = "default_guideline_type", rename = "type")]
    pub guideline_type: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub priority: i32,
}

fn default_unit() -> String {
    "g".to_owned()
}

fn default_guideline_type() -> String {
    "general".to_owned()
}
