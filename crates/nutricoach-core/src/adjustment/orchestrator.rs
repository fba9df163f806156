//! The diet-adjustment orchestrator.
//!
//! ```text
//! resolve plan -> load plan -> build prompt -> call model -> parse
//!     -> BEGIN; duplicate plan; apply edits; insert suggestion; COMMIT
//! ```
//!
//! The model is called before anything is written and outside any
//! transaction. All writes share one transaction, so a failure leaves no
//! orphaned duplicate plan.

use std::sync::Arc;

use anyhow::Context;
use chrono::Local;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use nutricoach_db::models::{AdjustmentSuggestion, PlanWithMeals, PromptTemplate};
use nutricoach_db::queries::adjustments::{self, NewAdjustment};
use nutricoach_db::queries::{feedback_templates, plans};

use super::AdjustmentError;
use crate::apply::{ApplyReport, apply_adjustments};
use crate::llm::{CompletionRequest, LanguageModel, normalize_model_name};
use crate::plan::{duplicate_plan, resolve_active_plan};
use crate::prompt::{CheckinData, EvolutionData, PromptInputs, PromptSettings, build_prompt};
use crate::response::{AdjustmentResponse, ModelOutput, parse_model_output};

/// Input to one orchestrator run.
#[derive(Debug, Clone)]
pub struct AdjustmentRequest {
    pub checkin_id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub checkin: CheckinData,
    pub evolution: EvolutionData,
    /// Template to use; the built-in default when `None`.
    pub template: Option<PromptTemplate>,
}

/// The stored suggestion plus what produced it.
#[derive(Debug, Clone, Serialize)]
pub struct AdjustmentOutcome {
    pub suggestion: AdjustmentSuggestion,
    pub response: AdjustmentResponse,
    pub report: ApplyReport,
}

pub struct DietAdjuster {
    pool: PgPool,
    model: Arc<dyn LanguageModel>,
}

impl DietAdjuster {
    pub fn new(pool: PgPool, model: Arc<dyn LanguageModel>) -> Self {
        Self { pool, model }
    }

    /// Turn one check-in into a pending suggestion backed by an edited
    /// draft copy of the patient's plan.
    ///
    /// Returns [`AdjustmentError::NoActivePlan`] before any write when the
    /// patient has no plans. Invalid model JSON is not an error: it yields
    /// a low-confidence suggestion whose feedback is the raw model text.
    pub async fn analyze_and_suggest(
        &self,
        request: &AdjustmentRequest,
    ) -> Result<AdjustmentOutcome, AdjustmentError> {
        let source = self.load_source_plan(request.patient_id).await?;
        info!(
            checkin_id = %request.checkin_id,
            patient_id = %request.patient_id,
            plan_id = %source.plan.id,
            "generating diet adjustment"
        );

        let feedback_style = self.feedback_style().await;
        let settings = request
            .template
            .as_ref()
            .map(PromptSettings::from)
            .unwrap_or_default();

        let prompt = build_prompt(
            &settings.template,
            &PromptInputs {
                patient_name: &request.patient_name,
                checkin: &request.checkin,
                evolution: &request.evolution,
                plan: &source,
                feedback_style: feedback_style.as_deref(),
            },
        );

        let completion = self
            .model
            .complete(&CompletionRequest {
                model: normalize_model_name(&settings.model),
                max_tokens: settings.max_tokens,
                temperature: settings.temperature,
                prompt,
            })
            .await?;

        let output = parse_model_output(&completion.text);
        if output.response.is_fallback() {
            warn!(checkin_id = %request.checkin_id, "storing low-confidence fallback suggestion");
        }

        match self.persist(request, &source, &output).await {
            Ok((suggestion, report)) => {
                info!(
                    adjustment_id = %suggestion.id,
                    suggested_plan_id = %suggestion.suggested_plan_id,
                    confidence = %suggestion.confidence,
                    "diet adjustment stored"
                );
                Ok(AdjustmentOutcome {
                    suggestion,
                    response: output.response,
                    report,
                })
            }
            Err(e) => {
                error!(checkin_id = %request.checkin_id, error = %format!("{e:#}"), "failed to store diet adjustment");
                Err(AdjustmentError::Persist(e))
            }
        }
    }

    async fn load_source_plan(&self, patient_id: Uuid) -> Result<PlanWithMeals, AdjustmentError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("failed to acquire connection")
            .map_err(AdjustmentError::PlanLoad)?;

        let plan = resolve_active_plan(&mut conn, patient_id)
            .await
            .map_err(AdjustmentError::PlanLoad)?
            .ok_or(AdjustmentError::NoActivePlan(patient_id))?;

        plans::get_plan_with_meals(&mut conn, plan.id)
            .await
            .map_err(AdjustmentError::PlanLoad)?
            .ok_or_else(|| AdjustmentError::PlanLoad(anyhow::anyhow!("plan {} not found", plan.id)))
    }

    /// Best effort: a missing or unreadable style example just leaves the
    /// placeholder empty.
    async fn feedback_style(&self) -> Option<String> {
        match feedback_templates::get_active_feedback_template(&self.pool).await {
            Ok(t) => t.map(|t| t.content),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "could not load feedback style template");
                None
            }
        }
    }

    async fn persist(
        &self,
        request: &AdjustmentRequest,
        source: &PlanWithMeals,
        output: &ModelOutput,
    ) -> anyhow::Result<(AdjustmentSuggestion, ApplyReport)> {
        let response = &output.response;
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        let suggested = duplicate_plan(&mut tx, source, Local::now().date_naive()).await?;
        let report = apply_adjustments(&mut tx, &suggested, response).await?;

        let suggestion = adjustments::insert_adjustment(
            &mut *tx,
            &NewAdjustment {
                checkin_id: request.checkin_id,
                patient_id: request.patient_id,
                original_plan_id: source.plan.id,
                suggested_plan_id: suggested.plan.id,
                summary: response.summary.clone(),
                feedback_text: response.feedback_text.clone(),
                confidence: response.confidence,
                ai_response: output.json.clone(),
            },
        )
        .await?;

        tx.commit().await.context("failed to commit transaction")?;
        Ok((suggestion, report))
    }
}
