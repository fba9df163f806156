//! Database query functions for the `diet_adjustment_suggestions` table.

use anyhow::{Context, Result};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::{AdjustmentStatus, AdjustmentSuggestion, Confidence};

/// Fields for a new suggestion row. Status always starts at `pending`.
#[derive(Debug, Clone)]
pub struct NewAdjustment {
    pub checkin_id: Uuid,
    pub patient_id: Uuid,
    pub original_plan_id: Uuid,
    pub suggested_plan_id: Uuid,
    pub summary: String,
    pub feedback_text: String,
    pub confidence: Confidence,
    pub ai_response: serde_json::Value,
}

/// Insert a suggestion in `pending` status.
pub async fn insert_adjustment<'e, E: PgExecutor<'e>>(
    exec: E,
    new: &NewAdjustment,
) -> Result<AdjustmentSuggestion> {
    let row = sqlx::query_as::<_, AdjustmentSuggestion>(
        "INSERT INTO diet_adjustment_suggestions \
             (checkin_id, patient_id, original_plan_id, suggested_plan_id, \
              summary, feedback_text, confidence, ai_response) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING *",
    )
    .bind(new.checkin_id)
    .bind(new.patient_id)
    .bind(new.original_plan_id)
    .bind(new.suggested_plan_id)
    .bind(&new.summary)
    .bind(&new.feedback_text)
    .bind(new.confidence)
    .bind(&new.ai_response)
    .fetch_one(exec)
    .await
    .context("failed to insert adjustment suggestion")?;

    Ok(row)
}

/// Fetch a suggestion by ID.
pub async fn get_adjustment<'e, E: PgExecutor<'e>>(
    exec: E,
    id: Uuid,
) -> Result<Option<AdjustmentSuggestion>> {
    let row = sqlx::query_as::<_, AdjustmentSuggestion>(
        "SELECT * FROM diet_adjustment_suggestions WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(exec)
    .await
    .context("failed to fetch adjustment suggestion")?;

    Ok(row)
}

/// The most recent suggestion generated for a check-in, if any.
pub async fn latest_for_checkin<'e, E: PgExecutor<'e>>(
    exec: E,
    checkin_id: Uuid,
) -> Result<Option<AdjustmentSuggestion>> {
    let row = sqlx::query_as::<_, AdjustmentSuggestion>(
        "SELECT * FROM diet_adjustment_suggestions \
         WHERE checkin_id = $1 \
         ORDER BY created_at DESC \
         LIMIT 1",
    )
    .bind(checkin_id)
    .fetch_optional(exec)
    .await
    .context("failed to fetch adjustment for check-in")?;

    Ok(row)
}

/// All suggestions for a patient, newest first.
pub async fn list_for_patient<'e, E: PgExecutor<'e>>(
    exec: E,
    patient_id: Uuid,
) -> Result<Vec<AdjustmentSuggestion>> {
    let rows = sqlx::query_as::<_, AdjustmentSuggestion>(
        "SELECT * FROM diet_adjustment_suggestions \
         WHERE patient_id = $1 \
         ORDER BY created_at DESC",
    )
    .bind(patient_id)
    .fetch_all(exec)
    .await
    .context("failed to list adjustment suggestions")?;

    Ok(rows)
}

/// Move a suggestion from `from` to `to`, stamping reviewer and review time.
///
/// Returns `None` when no row matched (missing ID or the status was not
/// `from` any more); the caller decides which.
pub async fn transition_status<'e, E: PgExecutor<'e>>(
    exec: E,
    id: Uuid,
    from: AdjustmentStatus,
    to: AdjustmentStatus,
    reviewed_by: Option<&str>,
) -> Result<Option<AdjustmentSuggestion>> {
    let row = sqlx::query_as::<_, AdjustmentSuggestion>(
        "UPDATE diet_adjustment_suggestions \
         SET status = $3, reviewed_at = now(), reviewed_by = $4 \
         WHERE id = $1 AND status = $2 \
         RETURNING *",
    )
    .bind(id)
    .bind(from)
    .bind(to)
    .bind(reviewed_by)
    .fetch_optional(exec)
    .await
    .with_context(|| format!("failed to transition adjustment {id} from {from} to {to}"))?;

    Ok(row)
}

/// Overwrite the patient-facing feedback text.
pub async fn update_feedback_text<'e, E: PgExecutor<'e>>(
    exec: E,
    id: Uuid,
    text: &str,
) -> Result<Option<AdjustmentSuggestion>> {
    let row = sqlx::query_as::<_, AdjustmentSuggestion>(
        "UPDATE diet_adjustment_suggestions SET feedback_text = $2 WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(text)
    .fetch_optional(exec)
    .await
    .context("failed to update feedback text")?;

    Ok(row)
}
