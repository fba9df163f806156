//! Database query functions for the `plan_guidelines` table.

use anyhow::{Context, Result};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::Guideline;

/// Fields for a new guideline row.
#[derive(Debug, Clone)]
pub struct NewGuideline {
    pub plan_id: Uuid,
    pub guideline_type: String,
    pub title: String,
    pub content: String,
    pub priority: i32,
}

impl NewGuideline {
    /// A copy of `guideline` re-parented under `plan_id`.
    pub fn copy_of(guideline: &Guideline, plan_id: Uuid) -> Self {
        Self {
            plan_id,
            guideline_type: guideline.guideline_type.clone(),
            title: guideline.title.clone(),
            content: guideline.content.clone(),
            priority: guideline.priority,
        }
    }
}

/// Insert a guideline row.
pub async fn insert_guideline<'e, E: PgExecutor<'e>>(exec: E, new: &NewGuideline) -> Result<Guideline> {
    let guideline = sqlx::query_as::<_, Guideline>(
        "INSERT INTO plan_guidelines (plan_id, guideline_type, title, content, priority) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(new.plan_id)
    .bind(&new.guideline_type)
    .bind(&new.title)
    .bind(&new.content)
    .bind(new.priority)
    .fetch_one(exec)
    .await
    .with_context(|| format!("failed to insert guideline {:?}", new.title))?;

    Ok(guideline)
}

/// List the guidelines of a plan, highest priority first.
pub async fn list_guidelines_for_plan<'e, E: PgExecutor<'e>>(
    exec: E,
    plan_id: Uuid,
) -> Result<Vec<Guideline>> {
    let rows = sqlx::query_as::<_, Guideline>(
        "SELECT * FROM plan_guidelines WHERE plan_id = $1 ORDER BY priority DESC, created_at ASC",
    )
    .bind(plan_id)
    .fetch_all(exec)
    .await
    .context("failed to list guidelines for plan")?;

    Ok(rows)
}
