use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Status of a nutrition plan. Only ever moves `draft -> active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    Active,
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Active => "active",
        };
        f.write_str(s)
    }
}

impl FromStr for PlanStatus {
    type Err = PlanStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            other => Err(PlanStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`PlanStatus`] string.
#[derive(Debug, Clone)]
pub struct PlanStatusParseError(pub String);

impl fmt::Display for PlanStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid plan status: {:?}", self.0)
    }
}

impl std::error::Error for PlanStatusParseError {}

// ---------------------------------------------------------------------------

/// Review status of an adjustment suggestion.
///
/// `Applied` exists in the schema but no operation in this workspace sets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentStatus {
    Pending,
    Approved,
    Rejected,
    Applied,
}

impl fmt::Display for AdjustmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Applied => "applied",
        };
        f.write_str(s)
    }
}

impl FromStr for AdjustmentStatus {
    type Err = AdjustmentStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "applied" => Ok(Self::Applied),
            other => Err(AdjustmentStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`AdjustmentStatus`] string.
#[derive(Debug, Clone)]
pub struct AdjustmentStatusParseError(pub String);

impl fmt::Display for AdjustmentStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid adjustment status: {:?}", self.0)
    }
}

impl std::error::Error for AdjustmentStatusParseError {}

// ---------------------------------------------------------------------------

/// Confidence the model reported for its own suggestion.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    #[default]
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A patient's nutrition plan.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NutritionPlan {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub name: String,
    pub status: PlanStatus,
    pub total_calories: Option<f64>,
    pub total_protein: Option<f64>,
    pub total_carbs: Option<f64>,
    pub total_fats: Option<f64>,
    pub notes: Option<String>,
    pub is_released: bool,
    pub active: bool,
    pub released_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A meal inside a plan.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Meal {
    pub id: Uuid,
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
    pub created_at: DateTime<Utc>,
}

/// A food item inside a meal.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Food {
    pub id: Uuid,
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
    pub created_at: DateTime<Utc>,
}

/// Free-text guidance attached to a plan.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Guideline {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub guideline_type: String,
    pub title: String,
    pub content: String,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
}

/// One model-generated proposal to change a patient's diet.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AdjustmentSuggestion {
    pub id: Uuid,
    pub checkin_id: Uuid,
    pub patient_id: Uuid,
    pub original_plan_id: Uuid,
    pub suggested_plan_id: Uuid,
    pub summary: String,
    pub feedback_text: String,
    pub confidence: Confidence,
    pub status: AdjustmentStatus,
    pub ai_response: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
}

/// Reusable prompt configuration for the language model.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PromptTemplate {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub prompt_template: String,
    pub model: String,
    pub max_tokens: i32,
    pub temperature: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A tone/style example spliced into prompts when available.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeedbackTemplate {
    pub id: Uuid,
    pub name: String,
    pub content: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// A meal together with its foods, ordered by `item_order`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealWithFoods {
    #[serde(flatten)]
    pub meal: Meal,
    pub foods: Vec<Food>,
}

/// A plan with meals, foods and guidelines joined in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanWithMeals {
    #[serde(flatten)]
    pub plan: NutritionPlan,
    pub meals: Vec<MealWithFoods>,
    pub guidelines: Vec<Guideline>,
}

impl PlanWithMeals {
    /// Total number of foods across all meals.
    pub fn food_count(&self) -> usize {
        self.meals.iter().map(|m| m.foods.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_status_display_roundtrip() {
        for v in [PlanStatus::Draft, PlanStatus::Active] {
            let parsed: PlanStatus = v.to_string().parse().expect("should parse");
            assert_eq!(v, parsed);
        }
    }

    #[test]
    fn plan_status_invalid() {
        assert!("archived".parse::<PlanStatus>().is_err());
    }

    #[test]
    fn adjustment_status_display_roundtrip() {
        let variants = [
            AdjustmentStatus::Pending,
            AdjustmentStatus::Approved,
            AdjustmentStatus::Rejected,
            AdjustmentStatus::Applied,
        ];
        for v in &variants {
            let parsed: AdjustmentStatus = v.to_string().parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn adjustment_status_invalid() {
        let err = "done".parse::<AdjustmentStatus>().unwrap_err();
        assert_eq!(err.to_string(), "invalid adjustment status: \"done\"");
    }

    #[test]
    fn confidence_defaults_to_low_and_deserializes_lowercase() {
        assert_eq!(Confidence::default(), Confidence::Low);
        let c: Confidence = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(c, Confidence::Medium);
    }
}
