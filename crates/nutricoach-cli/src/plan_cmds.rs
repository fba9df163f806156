//! CLI handlers for `nutricoach plan` subcommands.
//!
//! - `plan create <file> --patient <id>` imports a TOML plan as a draft
//! - `plan list <patient>` lists a patient's plans
//! - `plan show <plan-id>` prints meals, foods and guidelines
//! - `plan release <plan-id>` moves a draft to active
//! - `plan delete <plan-id>` removes a plan

use anyhow::{Context, Result};
use sqlx::PgPool;

use nutricoach_core::plan::{self, parse_plan_toml};
use nutricoach_core::prompt::format_diet;
use nutricoach_db::queries::plans as plan_queries;

use crate::PlanCommands;
use crate::resolve::{parse_id, read_input};

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

pub async fn run_plan_command(command: PlanCommands, pool: &PgPool) -> Result<()> {
    match command {
        PlanCommands::Create { file, patient } => cmd_create(pool, &file, &patient).await,
        PlanCommands::List { patient } => cmd_list(pool, &patient).await,
        PlanCommands::Show { plan_id, json } => cmd_show(pool, &plan_id, json).await,
        PlanCommands::Release { plan_id } => cmd_release(pool, &plan_id).await,
        PlanCommands::Delete { plan_id } => cmd_delete(pool, &plan_id).await,
    }
}

// -----------------------------------------------------------------------
// nutricoach plan create <file> --patient <id>
// -----------------------------------------------------------------------

async fn cmd_create(pool: &PgPool, file_path: &str, patient: &str) -> Result<()> {
    let patient_id = parse_id("patient", patient)?;
    let content = read_input("plan", file_path)?;
    let plan_toml = parse_plan_toml(&content)
        .with_context(|| format!("failed to parse plan file: {file_path}"))?;

    let created = plan::import_plan(pool, patient_id, &plan_toml).await?;

    println!("Plan created successfully.");
    println!();
    println!("  Plan ID:    {}", created.plan.id);
    println!("  Name:       {}", created.plan.name);
    println!("  Status:     {}", created.plan.status);
    println!("  Meals:      {}", created.meals.len());
    println!("  Foods:      {}", created.food_count());
    println!("  Guidelines: {}", created.guidelines.len());

    Ok(())
}

// -----------------------------------------------------------------------
// nutricoach plan list <patient>
// -----------------------------------------------------------------------

async fn cmd_list(pool: &PgPool, patient: &str) -> Result<()> {
    let patient_id = parse_id("patient", patient)?;
    let plans = plan_queries::list_plans_for_patient(pool, patient_id).await?;

    if plans.is_empty() {
        println!("No plans found. Use `nutricoach plan create <file> --patient {patient_id}` to create one.");
        return Ok(());
    }

    let id_w = 36;
    let name_w = plans
        .iter()
        .map(|p| p.name.chars().count())
        .max()
        .unwrap_or(4)
        .max(4);
    let status_w = 6;

    println!(
        "{:<id_w$}  {:<name_w$}  {:<status_w$}  {:>6}  CREATED",
        "ID", "NAME", "STATUS", "KCAL",
    );
    for p in &plans {
        let kcal = p
            .total_calories
            .map(|c| format!("{c:.0}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<id_w$}  {:<name_w$}  {:<status_w$}  {:>6}  {}",
            p.id,
            p.name,
            p.status,
            kcal,
            p.created_at.format("%Y-%m-%d %H:%M"),
        );
    }

    Ok(())
}

// -----------------------------------------------------------------------
// nutricoach plan show <plan-id>
// -----------------------------------------------------------------------

async fn cmd_show(pool: &PgPool, plan_id: &str, json: bool) -> Result<()> {
    let id = parse_id("plan", plan_id)?;
    let plan = plan::get_plan_with_meals(pool, id)
        .await?
        .with_context(|| format!("plan {id} not found"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("  ID:       {}", plan.plan.id);
    println!("  Patient:  {}", plan.plan.patient_id);
    println!("  Status:   {}", plan.plan.status);
    println!(
        "  Created:  {}",
        plan.plan.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(released) = plan.plan.released_at {
        println!("  Released: {}", released.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!();
    println!("{}", format_diet(&plan));

    Ok(())
}

// -----------------------------------------------------------------------
// nutricoach plan release / delete
// -----------------------------------------------------------------------

async fn cmd_release(pool: &PgPool, plan_id: &str) -> Result<()> {
    let id = parse_id("plan", plan_id)?;
    let plan = plan::release_plan(pool, id).await?;

    println!("Plan released.");
    println!();
    println!("  Plan ID:     {}", plan.id);
    println!("  Name:        {}", plan.name);
    println!("  Status:      {}", plan.status);
    if let Some(released) = plan.released_at {
        println!("  Released at: {}", released.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    Ok(())
}

async fn cmd_delete(pool: &PgPool, plan_id: &str) -> Result<()> {
    let id = parse_id("plan", plan_id)?;
    plan_queries::delete_plan(pool, id).await?;
    println!("Plan {id} deleted.");
    Ok(())
}
