//! Database query functions for the `feedback_templates` table.

use anyhow::{Context, Result};
use sqlx::PgExecutor;

use crate::models::FeedbackTemplate;

/// Insert a feedback-style template.
pub async fn insert_feedback_template<'e, E: PgExecutor<'e>>(
    exec: E,
    name: &str,
    content: &str,
    is_active: bool,
) -> Result<FeedbackTemplate> {
    let row = sqlx::query_as::<_, FeedbackTemplate>(
        "INSERT INTO feedback_templates (name, content, is_active) \
         VALUES ($1, $2, $3) \
         RETURNING *",
    )
    .bind(name)
    .bind(content)
    .bind(is_active)
    .fetch_one(exec)
    .await
    .context("failed to insert feedback template")?;

    Ok(row)
}

/// The newest active feedback-style template, if any.
pub async fn get_active_feedback_template<'e, E: PgExecutor<'e>>(
    exec: E,
) -> Result<Option<FeedbackTemplate>> {
    let row = sqlx::query_as::<_, FeedbackTemplate>(
        "SELECT * FROM feedback_templates WHERE is_active ORDER BY created_at DESC LIMIT 1",
    )
    .fetch_optional(exec)
    .await
    .context("failed to fetch active feedback template")?;

    Ok(row)
}
