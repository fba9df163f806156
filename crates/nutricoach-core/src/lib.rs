//! Diet-adjustment pipeline for nutricoach.
//!
//! Turns a patient check-in into a reviewable, edited copy of the patient's
//! nutrition plan: the plan is sent to a language model together with the
//! check-in, the model's free-text edits are reconciled against stored
//! meals and foods, and the result is stored as a pending suggestion.

pub mod adjustment;
pub mod apply;
pub mod error;
pub mod llm;
pub mod matching;
pub mod plan;
pub mod prompt;
pub mod quantity;
pub mod response;
pub mod templates;
