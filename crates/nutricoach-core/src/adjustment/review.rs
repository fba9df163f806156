//! Review of stored suggestions.
//!
//! ```text
//! pending -> approved   (optionally releasing the suggested plan)
//! pending -> rejected
//! ```
//!
//! Both targets are terminal. `applied` exists in the schema but no
//! operation here moves a suggestion into it.

use anyhow::{Context, Result, anyhow};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use nutricoach_db::models::{AdjustmentStatus, AdjustmentSuggestion};
use nutricoach_db::queries::adjustments as db;

use crate::error::OperationError;
use crate::plan::release_draft;

pub struct AdjustmentStateMachine;

impl AdjustmentStateMachine {
    pub fn is_valid_transition(from: AdjustmentStatus, to: AdjustmentStatus) -> bool {
        matches!(
            (from, to),
            (AdjustmentStatus::Pending, AdjustmentStatus::Approved)
                | (AdjustmentStatus::Pending, AdjustmentStatus::Rejected)
        )
    }

    /// Guarded `from -> to` transition on `conn`.
    ///
    /// Fails if the edge is not in the graph, the suggestion does not
    /// exist, or its status is no longer `from`.
    async fn transition(
        conn: &mut sqlx::PgConnection,
        id: Uuid,
        from: AdjustmentStatus,
        to: AdjustmentStatus,
        reviewer: Option<&str>,
    ) -> Result<AdjustmentSuggestion, OperationError> {
        if !Self::is_valid_transition(from, to) {
            return Err(anyhow!("invalid adjustment transition: {from} -> {to} for {id}").into());
        }

        if let Some(row) = db::transition_status(&mut *conn, id, from, to, reviewer).await? {
            return Ok(row);
        }

        match db::get_adjustment(&mut *conn, id).await? {
            None => Err(OperationError::not_found("adjustment", id)),
            Some(row) => Err(OperationError::WrongStatus {
                kind: "adjustment",
                id,
                action: to.to_string(),
                current: row.status.to_string(),
                required: from.to_string(),
            }),
        }
    }
}

/// The most recent suggestion for a check-in.
pub async fn get_adjustment_for_checkin(
    pool: &PgPool,
    checkin_id: Uuid,
) -> Result<Option<AdjustmentSuggestion>> {
    db::latest_for_checkin(pool, checkin_id).await
}

/// Approve a pending suggestion. With `activate_diet`, the suggested plan
/// is released in the same transaction; if that fails nothing changes.
pub async fn approve_adjustment(
    pool: &PgPool,
    id: Uuid,
    activate_diet: bool,
    reviewer: Option<&str>,
) -> Result<AdjustmentSuggestion, OperationError> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let row = AdjustmentStateMachine::transition(
        &mut tx,
        id,
        AdjustmentStatus::Pending,
        AdjustmentStatus::Approved,
        reviewer,
    )
    .await?;

    if activate_diet {
        release_draft(&mut tx, row.suggested_plan_id).await?;
    }

    tx.commit().await.context("failed to commit transaction")?;

    info!(
        adjustment_id = %id,
        suggested_plan_id = %row.suggested_plan_id,
        activated = activate_diet,
        "adjustment approved"
    );
    Ok(row)
}

/// Reject a pending suggestion. Neither referenced plan is touched.
pub async fn reject_adjustment(
    pool: &PgPool,
    id: Uuid,
    reviewer: Option<&str>,
) -> Result<AdjustmentSuggestion, OperationError> {
    let mut conn = pool.acquire().await.context("failed to acquire connection")?;
    let row = AdjustmentStateMachine::transition(
        &mut conn,
        id,
        AdjustmentStatus::Pending,
        AdjustmentStatus::Rejected,
        reviewer,
    )
    .await?;

    info!(adjustment_id = %id, "adjustment rejected");
    Ok(row)
}

/// Replace the patient-facing feedback text, whatever the status.
pub async fn update_feedback_text(
    pool: &PgPool,
    id: Uuid,
    text: &str,
) -> Result<AdjustmentSuggestion, OperationError> {
    db::update_feedback_text(pool, id, text)
        .await?
        .ok_or(OperationError::not_found("adjustment", id))
}
