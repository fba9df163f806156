//! CLI handlers for `nutricoach adjust` subcommands, plus the check-in
//! payload shared with the HTTP API.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use nutricoach_core::adjustment::{
    self, AdjustmentOutcome, AdjustmentRequest, DietAdjuster,
};
use nutricoach_core::error::OperationError;
use nutricoach_core::prompt::{CheckinData, EvolutionData};
use nutricoach_core::templates::{TemplateCache, TemplateStore};
use nutricoach_db::models::AdjustmentSuggestion;

use crate::AdjustCommands;
use crate::config::ModelConfig;
use crate::resolve::{parse_id, read_input};

/// A check-in submitted for adjustment.
///
/// ```json
/// {
///   "patient_id": "…",
///   "patient_name": "Maria",
///   "checkin": { "peso": 72.5, "fome_algum_horario": "à tarde" },
///   "evolution": { "weight_delta": -1.2 }
/// }
/// ```
///
/// `checkin_id` comes from the file for `adjust generate` and from the URL
/// for the HTTP route. Without `template_id` the active template is used,
/// and the built-in prompt when none is active.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckinPayload {
    #[serde(default)]
    pub checkin_id: Option<Uuid>,
    pub patient_id: Uuid,
    #[serde(default)]
    pub patient_name: String,
    #[serde(default)]
    pub checkin: CheckinData,
    #[serde(default)]
    pub evolution: EvolutionData,
    #[serde(default)]
    pub template_id: Option<Uuid>,
}

impl CheckinPayload {
    /// Resolve the template and build the orchestrator input.
    pub async fn into_request(
        self,
        checkin_id: Uuid,
        templates: &TemplateStore,
    ) -> Result<AdjustmentRequest, OperationError> {
        let template = match self.template_id {
            Some(id) => Some(
                templates
                    .get(id)
                    .await?
                    .ok_or(OperationError::not_found("prompt template", id))?,
            ),
            None => templates.get_active().await?,
        };

        Ok(AdjustmentRequest {
            checkin_id,
            patient_id: self.patient_id,
            patient_name: self.patient_name,
            checkin: self.checkin,
            evolution: self.evolution,
            template,
        })
    }
}

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

pub async fn run_adjust_command(
    command: AdjustCommands,
    pool: &PgPool,
    model: &ModelConfig,
) -> Result<()> {
    match command {
        AdjustCommands::Generate { file } => cmd_generate(pool, model, &file).await,
        AdjustCommands::Show { checkin_id } => {
            let id = parse_id("check-in", &checkin_id)?;
            match adjustment::get_adjustment_for_checkin(pool, id).await? {
                Some(s) => print_suggestion(&s),
                None => println!("No adjustment found for check-in {id}."),
            }
            Ok(())
        }
        AdjustCommands::Approve {
            adjustment_id,
            activate,
            reviewer,
        } => {
            let id = parse_id("adjustment", &adjustment_id)?;
            let s = adjustment::approve_adjustment(pool, id, activate, reviewer.as_deref()).await?;
            println!("Adjustment {id} approved.");
            if activate {
                println!("Plan {} is now active.", s.suggested_plan_id);
            }
            Ok(())
        }
        AdjustCommands::Reject {
            adjustment_id,
            reviewer,
        } => {
            let id = parse_id("adjustment", &adjustment_id)?;
            adjustment::reject_adjustment(pool, id, reviewer.as_deref()).await?;
            println!("Adjustment {id} rejected.");
            Ok(())
        }
        AdjustCommands::Feedback {
            adjustment_id,
            text,
        } => {
            let id = parse_id("adjustment", &adjustment_id)?;
            adjustment::update_feedback_text(pool, id, &text).await?;
            println!("Feedback text for adjustment {id} updated.");
            Ok(())
        }
    }
}

// -----------------------------------------------------------------------
// nutricoach adjust generate <file>
// -----------------------------------------------------------------------

async fn cmd_generate(pool: &PgPool, model: &ModelConfig, file_path: &str) -> Result<()> {
    let content = read_input("check-in", file_path)?;
    let payload: CheckinPayload = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse check-in file: {file_path}"))?;
    let checkin_id = payload
        .checkin_id
        .with_context(|| format!("check-in file {file_path} has no checkin_id"))?;

    let client = model.client()?;
    let templates = TemplateStore::new(pool.clone(), Arc::new(TemplateCache::default()));
    let request = payload.into_request(checkin_id, &templates).await?;

    let adjuster = DietAdjuster::new(pool.clone(), Arc::new(client));
    let outcome = adjuster.analyze_and_suggest(&request).await?;

    print_outcome(&outcome);
    Ok(())
}

// -----------------------------------------------------------------------
// Output
// -----------------------------------------------------------------------

fn print_outcome(outcome: &AdjustmentOutcome) {
    print_suggestion(&outcome.suggestion);

    let r = &outcome.report;
    println!();
    println!(
        "Applied: {} modified, {} added, {} removed",
        r.foods_modified, r.foods_added, r.foods_removed
    );
    if !r.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for w in &r.warnings {
            println!("  - {w}");
        }
    }
}

fn print_suggestion(s: &AdjustmentSuggestion) {
    println!("Adjustment: {}", s.id);
    println!("  Check-in:       {}", s.checkin_id);
    println!("  Status:         {}", s.status);
    println!("  Confidence:     {}", s.confidence);
    println!("  Original plan:  {}", s.original_plan_id);
    println!("  Suggested plan: {}", s.suggested_plan_id);
    println!(
        "  Created:        {}",
        s.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(reviewed) = s.reviewed_at {
        let by = s.reviewed_by.as_deref().unwrap_or("-");
        println!(
            "  Reviewed:       {} by {by}",
            reviewed.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    println!();
    println!("Summary:");
    println!("  {}", s.summary);
    println!();
    println!("Feedback:");
    for line in s.feedback_text.lines() {
        println!("  {line}");
    }
}
