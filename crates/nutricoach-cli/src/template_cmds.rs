//! CLI handlers for `nutricoach template` subcommands.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;

use nutricoach_core::templates::{TemplateCache, TemplateStore, parse_template_toml};

use crate::TemplateCommands;
use crate::resolve::{parse_id, read_input};

pub async fn run_template_command(command: TemplateCommands, pool: &PgPool) -> Result<()> {
    // One-shot process: a fresh cache per invocation.
    let store = TemplateStore::new(pool.clone(), Arc::new(TemplateCache::default()));

    match command {
        TemplateCommands::List => cmd_list(&store).await,
        TemplateCommands::Show { template_id } => cmd_show(&store, &template_id).await,
        TemplateCommands::Add { file, activate } => cmd_add(&store, &file, activate).await,
        TemplateCommands::Activate { template_id } => {
            let id = parse_id("template", &template_id)?;
            let t = store.set_active(id).await?;
            println!("Template {:?} ({}) is now active.", t.name, t.id);
            Ok(())
        }
        TemplateCommands::Delete { template_id } => {
            let id = parse_id("template", &template_id)?;
            store.delete(id).await?;
            println!("Template {id} deleted.");
            Ok(())
        }
    }
}

async fn cmd_list(store: &TemplateStore) -> Result<()> {
    let templates = store.list().await?;
    if templates.is_empty() {
        println!("No prompt templates. The built-in default prompt is used.");
        return Ok(());
    }

    let name_w = templates
        .iter()
        .map(|t| t.name.chars().count())
        .max()
        .unwrap_or(4)
        .max(4);
    println!(
        "{:<36}  {:<name_w$}  {:<6}  {:<28}  {:>6}  TEMP",
        "ID", "NAME", "ACTIVE", "MODEL", "TOKENS",
    );
    for t in &templates {
        println!(
            "{:<36}  {:<name_w$}  {:<6}  {:<28}  {:>6}  {:.2}",
            t.id,
            t.name,
            if t.is_active { "yes" } else { "" },
            t.model,
            t.max_tokens,
            t.temperature,
        );
    }
    Ok(())
}

async fn cmd_show(store: &TemplateStore, template_id: &str) -> Result<()> {
    let id = parse_id("template", template_id)?;
    let t = store
        .get(id)
        .await?
        .with_context(|| format!("prompt template {id} not found"))?;

    println!("Template: {}", t.name);
    println!("  ID:          {}", t.id);
    println!("  Active:      {}", t.is_active);
    println!("  Model:       {}", t.model);
    println!("  Max tokens:  {}", t.max_tokens);
    println!("  Temperature: {}", t.temperature);
    if let Some(desc) = &t.description {
        println!("  Description: {desc}");
    }
    println!();
    println!("{}", t.prompt_template);
    Ok(())
}

async fn cmd_add(store: &TemplateStore, file_path: &str, activate: bool) -> Result<()> {
    let content = read_input("template", file_path)?;
    let fields = parse_template_toml(&content)
        .with_context(|| format!("failed to parse template file: {file_path}"))?;

    let mut t = store.create(&fields).await?;
    if activate {
        t = store.set_active(t.id).await?;
    }

    println!("Template created.");
    println!();
    println!("  Template ID: {}", t.id);
    println!("  Name:        {}", t.name);
    println!("  Active:      {}", t.is_active);
    Ok(())
}
