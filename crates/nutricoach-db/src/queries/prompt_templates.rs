//! Database query functions for the `prompt_templates` table.

use anyhow::{Context, Result};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::PromptTemplate;

/// Editable fields of a prompt template.
#[derive(Debug, Clone)]
pub struct TemplateFields {
    pub name: String,
    pub description: Option<String>,
    pub prompt_template: String,
    pub model: String,
    pub max_tokens: i32,
    pub temperature: f64,
}

/// Insert an inactive template.
pub async fn insert_template<'e, E: PgExecutor<'e>>(
    exec: E,
    fields: &TemplateFields,
) -> Result<PromptTemplate> {
    let row = sqlx::query_as::<_, PromptTemplate>(
        "INSERT INTO prompt_templates \
             (name, description, prompt_template, model, max_tokens, temperature) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *",
    )
    .bind(&fields.name)
    .bind(&fields.description)
    .bind(&fields.prompt_template)
    .bind(&fields.model)
    .bind(fields.max_tokens)
    .bind(fields.temperature)
    .fetch_one(exec)
    .await
    .with_context(|| format!("failed to insert prompt template {:?}", fields.name))?;

    Ok(row)
}

/// Fetch a template by ID.
pub async fn get_template<'e, E: PgExecutor<'e>>(exec: E, id: Uuid) -> Result<Option<PromptTemplate>> {
    let row = sqlx::query_as::<_, PromptTemplate>("SELECT * FROM prompt_templates WHERE id = $1")
        .bind(id)
        .fetch_optional(exec)
        .await
        .context("failed to fetch prompt template")?;

    Ok(row)
}

/// List all templates, active first, then by name.
pub async fn list_templates<'e, E: PgExecutor<'e>>(exec: E) -> Result<Vec<PromptTemplate>> {
    let rows = sqlx::query_as::<_, PromptTemplate>(
        "SELECT * FROM prompt_templates ORDER BY is_active DESC, name ASC, created_at ASC",
    )
    .fetch_all(exec)
    .await
    .context("failed to list prompt templates")?;

    Ok(rows)
}

/// The active template, if one is set.
pub async fn get_active_template<'e, E: PgExecutor<'e>>(exec: E) -> Result<Option<PromptTemplate>> {
    let row = sqlx::query_as::<_, PromptTemplate>(
        "SELECT * FROM prompt_templates WHERE is_active LIMIT 1",
    )
    .fetch_optional(exec)
    .await
    .context("failed to fetch active prompt template")?;

    Ok(row)
}

/// Replace the editable fields of a template.
pub async fn update_template<'e, E: PgExecutor<'e>>(
    exec: E,
    id: Uuid,
    fields: &TemplateFields,
) -> Result<Option<PromptTemplate>> {
    let row = sqlx::query_as::<_, PromptTemplate>(
        "UPDATE prompt_templates SET \
             name = $2, description = $3, prompt_template = $4, \
             model = $5, max_tokens = $6, temperature = $7, updated_at = now() \
         WHERE id = $1 \
         RETURNING *",
    )
    .bind(id)
    .bind(&fields.name)
    .bind(&fields.description)
    .bind(&fields.prompt_template)
    .bind(&fields.model)
    .bind(fields.max_tokens)
    .bind(fields.temperature)
    .fetch_optional(exec)
    .await
    .context("failed to update prompt template")?;

    Ok(row)
}

/// Delete a template. Returns the number of rows removed.
pub async fn delete_template<'e, E: PgExecutor<'e>>(exec: E, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM prompt_templates WHERE id = $1")
        .bind(id)
        .execute(exec)
        .await
        .context("failed to delete prompt template")?;

    Ok(result.rows_affected())
}

/// Make `id` the only active template.
///
/// Both statements run in one transaction; together with the partial
/// unique index on `is_active` no reader ever sees two active rows, and a
/// missing ID leaves the previous active template untouched.
pub async fn set_active_template(pool: &PgPool, id: Uuid) -> Result<PromptTemplate> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    sqlx::query("UPDATE prompt_templates SET is_active = FALSE, updated_at = now() WHERE is_active AND id <> $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("failed to deactivate prompt templates")?;

    let row = sqlx::query_as::<_, PromptTemplate>(
        "UPDATE prompt_templates SET is_active = TRUE, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await
    .context("failed to activate prompt template")?;

    let Some(row) = row else {
        // Dropping the transaction rolls back the deactivation.
        anyhow::bail!("prompt template {id} not found");
    };

    tx.commit().await.context("failed to commit transaction")?;
    Ok(row)
}
