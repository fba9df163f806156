//! Prompt-template store with an injected, time-bounded list cache.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use nutricoach_db::models::PromptTemplate;
use nutricoach_db::queries::prompt_templates::{self as db, TemplateFields};

use crate::llm::PINNED_SONNET_MODEL;
use crate::prompt::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// Holds the template list for `ttl` after it was stored.
///
/// Refills are not coordinated: two readers that both miss will both query
/// and both `set`, the last write winning.
#[derive(Debug)]
pub struct TemplateCache {
    ttl: Duration,
    entry: Mutex<Option<(Instant, Vec<PromptTemplate>)>>,
}

impl TemplateCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached list, unless it is missing or older than the TTL.
    pub fn get(&self) -> Option<Vec<PromptTemplate>> {
        let guard = self.lock();
        match guard.as_ref() {
            Some((stored_at, list)) if stored_at.elapsed() < self.ttl => Some(list.clone()),
            _ => None,
        }
    }

    pub fn set(&self, templates: Vec<PromptTemplate>) {
        *self.lock() = Some((Instant::now(), templates));
    }

    pub fn invalidate(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> MutexGuard<'_, Option<(Instant, Vec<PromptTemplate>)>> {
        // A panic while holding the lock cannot leave the Option half-written.
        self.entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// CRUD over prompt templates. List reads are served from the cache; every
/// write invalidates it.
#[derive(Clone)]
pub struct TemplateStore {
    pool: PgPool,
    cache: Arc<TemplateCache>,
}

impl TemplateStore {
    pub fn new(pool: PgPool, cache: Arc<TemplateCache>) -> Self {
        Self { pool, cache }
    }

    pub async fn list(&self) -> Result<Vec<PromptTemplate>> {
        if let Some(cached) = self.cache.get() {
            debug!(count = cached.len(), "template list served from cache");
            return Ok(cached);
        }
        let rows = db::list_templates(&self.pool).await?;
        self.cache.set(rows.clone());
        Ok(rows)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<PromptTemplate>> {
        db::get_template(&self.pool, id).await
    }

    /// The active template, looked up through the cached list.
    pub async fn get_active(&self) -> Result<Option<PromptTemplate>> {
        Ok(self.list().await?.into_iter().find(|t| t.is_active))
    }

    pub async fn create(&self, fields: &TemplateFields) -> Result<PromptTemplate> {
        validate_fields(fields)?;
        let row = db::insert_template(&self.pool, fields).await?;
        self.cache.invalidate();
        info!(template_id = %row.id, name = %row.name, "prompt template created");
        Ok(row)
    }

    pub async fn update(&self, id: Uuid, fields: &TemplateFields) -> Result<PromptTemplate> {
        validate_fields(fields)?;
        let row = db::update_template(&self.pool, id, fields)
            .await?
            .with_context(|| format!("prompt template {id} not found"))?;
        self.cache.invalidate();
        Ok(row)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let removed = db::delete_template(&self.pool, id).await?;
        self.cache.invalidate();
        if removed == 0 {
            bail!("prompt template {id} not found");
        }
        Ok(())
    }

    /// Make `id` the single active template.
    pub async fn set_active(&self, id: Uuid) -> Result<PromptTemplate> {
        let result = db::set_active_template(&self.pool, id).await;
        self.cache.invalidate();
        let row = result?;
        info!(template_id = %id, "prompt template activated");
        Ok(row)
    }
}

fn validate_fields(fields: &TemplateFields) -> Result<()> {
    if fields.name.trim().is_empty() {
        bail!("template name must not be empty");
    }
    if fields.prompt_template.trim().is_empty() {
        bail!("template text must not be empty");
    }
    if fields.max_tokens <= 0 {
        bail!("max_tokens must be positive, got {}", fields.max_tokens);
    }
    if !(0.0..=1.0).contains(&fields.temperature) {
        bail!("temperature must be between 0 and 1, got {}", fields.temperature);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// TOML import
// ---------------------------------------------------------------------------

/// On-disk form of a prompt template.
///
/// ```toml
/// name = "Ajuste padrão"
/// model = "claude-sonnet"
/// prompt = """
/// Paciente: {patientName}
/// """
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateToml {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub prompt: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_model() -> String {
    PINNED_SONNET_MODEL.to_owned()
}

fn default_max_tokens() -> i32 {
    DEFAULT_MAX_TOKENS as i32
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

#[derive(Debug, Error)]
pub enum TemplateParseError {
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("template does not use any placeholder; expected at least {{checkinData}} or {{currentDiet}}")]
    NoPlaceholders,
}

const PLACEHOLDERS: [&str; 8] = [
    "{patientName}",
    "{checkinData}",
    "{currentDiet}",
    "{evolutionData}",
    "{objetivo}",
    "{fome_horario}",
    "{alimento_incluir}",
    "{feedbackTemplate}",
];

/// Parse a template file into insertable fields.
pub fn parse_template_toml(content: &str) -> Result<TemplateFields, TemplateParseError> {
    let t: TemplateToml = toml::from_str(content)?;
    if !PLACEHOLDERS.iter().any(|p| t.prompt.contains(p)) {
        return Err(TemplateParseError::NoPlaceholders);
    }
    Ok(TemplateFields {
        name: t.name,
        description: t.description,
        prompt_template: t.prompt,
        model: t.model,
        max_tokens: t.max_tokens,
        temperature: t.temperature,
    })
}
