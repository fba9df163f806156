pub mod adjustments;
pub mod feedback_templates;
pub mod foods;
pub mod guidelines;
pub mod meals;
pub mod plans;
pub mod prompt_templates;
