mod adjust_cmds;
mod config;
mod plan_cmds;
mod resolve;
mod serve_cmd;
mod template_cmds;
#[cfg(test)]
mod test_util;

use clap::{Parser, Subcommand};

use nutricoach_db::pool;

use config::NutricoachConfig;

#[derive(Parser)]
#[command(name = "nutricoach", about = "Check-in driven diet adjustments with human review")]
struct Cli {
    /// Database URL (overrides NUTRICOACH_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a nutricoach config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/nutricoach")]
        db_url: String,
        /// Anthropic API key stored in the config file
        #[arg(long)]
        api_key: Option<String>,
        /// Override the language-model API base URL
        #[arg(long)]
        base_url: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create the database if needed and run migrations
    DbInit,
    /// Diet plan management
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Prompt template management
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
    /// Generate and review diet adjustments
    Adjust {
        #[command(subcommand)]
        command: AdjustCommands,
    },
    /// Serve the JSON HTTP API
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Import a plan from a TOML file (created as draft)
    Create {
        /// Path to the plan TOML file
        file: String,
        /// Patient the plan belongs to
        #[arg(long)]
        patient: String,
    },
    /// List a patient's plans, newest first
    List {
        /// Patient ID
        patient: String,
    },
    /// Show a plan with meals, foods and guidelines
    Show {
        /// Plan ID
        plan_id: String,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Release a draft plan to the patient
    Release {
        /// Plan ID
        plan_id: String,
    },
    /// Delete a plan and everything under it
    Delete {
        /// Plan ID
        plan_id: String,
    },
}

#[derive(Subcommand)]
pub enum TemplateCommands {
    /// List prompt templates
    List,
    /// Show one template including its text
    Show {
        /// Template ID
        template_id: String,
    },
    /// Add a template from a TOML file
    Add {
        /// Path to the template TOML file
        file: String,
        /// Make the new template the active one
        #[arg(long)]
        activate: bool,
    },
    /// Make a template the single active one
    Activate {
        /// Template ID
        template_id: String,
    },
    /// Delete a template
    Delete {
        /// Template ID
        template_id: String,
    },
}

#[derive(Subcommand)]
pub enum AdjustCommands {
    /// Run the adjustment pipeline for a check-in described by a JSON file
    Generate {
        /// Path to the check-in JSON file
        file: String,
    },
    /// Show the latest suggestion for a check-in
    Show {
        /// Check-in ID
        checkin_id: String,
    },
    /// Approve a pending suggestion
    Approve {
        /// Suggestion ID
        adjustment_id: String,
        /// Also release the suggested plan to the patient
        #[arg(long)]
        activate: bool,
        /// Who reviewed the suggestion
        #[arg(long)]
        reviewer: Option<String>,
    },
    /// Reject a pending suggestion
    Reject {
        /// Suggestion ID
        adjustment_id: String,
        /// Who reviewed the suggestion
        #[arg(long)]
        reviewer: Option<String>,
    },
    /// Replace the patient-facing feedback text
    Feedback {
        /// Suggestion ID
        adjustment_id: String,
        /// New feedback text
        text: String,
    },
}

/// Execute `nutricoach init`: write the config file.
fn cmd_init(
    db_url: &str,
    api_key: Option<String>,
    base_url: Option<String>,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let has_key = api_key.is_some();
    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        model: config::ModelSection { api_key, base_url },
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    if has_key {
        println!("  model.api_key = (set)");
    } else {
        println!("  model.api_key not set; export ANTHROPIC_API_KEY before generating adjustments");
    }
    println!();
    println!("Next: run `nutricoach db-init` to create and migrate the database.");

    Ok(())
}

/// Execute `nutricoach db-init`: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = NutricoachConfig::resolve(cli_db_url)?;

    println!("Initializing nutricoach database...");

    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("nutricoach db-init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            db_url,
            api_key,
            base_url,
            force,
        } => {
            cmd_init(&db_url, api_key, base_url, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Plan { command } => {
            let resolved = NutricoachConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = plan_cmds::run_plan_command(command, &db_pool).await;
            db_pool.close().await;
            result?;
        }
        Commands::Template { command } => {
            let resolved = NutricoachConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = template_cmds::run_template_command(command, &db_pool).await;
            db_pool.close().await;
            result?;
        }
        Commands::Adjust { command } => {
            let resolved = NutricoachConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = adjust_cmds::run_adjust_command(command, &db_pool, &resolved.model).await;
            db_pool.close().await;
            result?;
        }
        Commands::Serve { bind, port } => {
            let resolved = NutricoachConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = serve_cmd::run_serve(db_pool.clone(), &resolved.model, &bind, port).await;
            db_pool.close().await;
            result?;
        }
    }

    Ok(())
}
