//! Check-in driven diet adjustment: the orchestrator that produces a
//! suggestion, and the review operations that settle it.

pub mod orchestrator;
pub mod review;

use thiserror::Error;
use uuid::Uuid;

use crate::llm::LlmError;

pub use orchestrator::{AdjustmentOutcome, AdjustmentRequest, DietAdjuster};
pub use review::{
    AdjustmentStateMachine, approve_adjustment, get_adjustment_for_checkin, reject_adjustment,
    update_feedback_text,
};

/// User-facing message for any failure while saving a suggestion.
pub const PERSIST_FAILED_MESSAGE: &str = "could not save the diet adjustment; please try again";

/// Failures of [`DietAdjuster::analyze_and_suggest`].
#[derive(Debug, Error)]
pub enum AdjustmentError {
    /// The patient has no plan at all; nothing was written.
    #[error("no diet plan found for patient {0}")]
    NoActivePlan(Uuid),

    #[error("failed to load the patient's plan: {0:#}")]
    PlanLoad(#[source] anyhow::Error),

    /// Transport and API failures of the model call, unchanged.
    #[error(transparent)]
    Model(LlmError),

    #[error("language model response missing text content")]
    MissingTextContent,

    /// Duplication, edits or the suggestion insert failed and were rolled
    /// back. The message is generic; the cause is logged and
    /// kept as the source.
    #[error("could not save the diet adjustment; please try again")]
    Persist(#[source] anyhow::Error),
}

impl From<LlmError> for AdjustmentError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::MissingTextContent => Self::MissingTextContent,
            other => Self::Model(other),
        }
    }
}
