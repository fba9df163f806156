//! Plan management: TOML import, active-plan resolution, duplication.

pub mod parser;
pub mod service;
pub mod toml_format;

pub use parser::{PlanParseError, parse_plan_toml};
pub use service::{
    duplicate_name, duplicate_plan, get_plan_with_meals, import_plan, release_draft, release_plan,
    resolve_active_plan,
};
pub use toml_format::{FoodToml, GuidelineToml, MealToml, PlanMeta, PlanToml};
