//! CLI for running catalog migrations
//!
//! `list` and `steps` print JSON for scripting; `run` renders progress on the
//! console (or as log lines with `--log-progress`).

use anyhow::{anyhow, Context, Result};
use catalog_migrator::config::Config;
use catalog_migrator::data_migrations::{all_migrations, find_migration};
use catalog_migrator::db::MySqlDatabase;
use catalog_migrator::engine::{MigrationRunner, RunReport};
use catalog_migrator::kernel::{BaseProgress, MigrationDeps};
use catalog_migrator::progress::{ConsoleProgress, TracingProgress};
use clap::{Parser, Subcommand};
use console::style;
use serde::Serialize;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "migrate_cli")]
#[command(about = "RadicalMart catalog migration CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all registered migrations
    List,

    /// Show the steps of a migration in execution order
    Steps { version: String },

    /// Run a migration against DATABASE_URL
    Run {
        version: String,
        /// Skip the steps that re-save entities through the admin model
        #[arg(long)]
        skip_resave: bool,
        /// Rows per page (overrides MIGRATION_PAGE_SIZE)
        #[arg(long)]
        page_size: Option<u32>,
        /// Table prefix (overrides DB_PREFIX)
        #[arg(long)]
        prefix: Option<String>,
        /// Report progress as log lines instead of bars
        #[arg(long)]
        log_progress: bool,
    },
}

// ============================================================================
// JSON Response Types
// ============================================================================

#[derive(Serialize)]
struct Response {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    migrations: Option<Vec<MigrationInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    steps: Option<Vec<StepInfo>>,
}

#[derive(Serialize)]
struct MigrationInfo {
    version: String,
    description: Option<String>,
}

#[derive(Serialize)]
struct StepInfo {
    name: String,
    title: String,
    resave: bool,
}

fn output(resp: Response) -> Result<()> {
    println!("{}", serde_json::to_string(&resp)?);
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,catalog_migrator=info,migrate_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => cmd_list(),
        Commands::Steps { version } => cmd_steps(&version),
        Commands::Run {
            version,
            skip_resave,
            page_size,
            prefix,
            log_progress,
        } => cmd_run(&version, skip_resave, page_size, prefix, log_progress).await,
    }
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_list() -> Result<()> {
    let migrations: Vec<MigrationInfo> = all_migrations()
        .into_iter()
        .map(|e| MigrationInfo {
            version: e.migration.version().to_string(),
            description: {
                let desc = e.migration.description();
                if desc.is_empty() {
                    None
                } else {
                    Some(desc.to_string())
                }
            },
        })
        .collect();

    output(Response {
        success: true,
        message: None,
        migrations: Some(migrations),
        steps: None,
    })
}

fn cmd_steps(version: &str) -> Result<()> {
    let entry = match find_migration(version) {
        Some(e) => e,
        None => {
            return output(Response {
                success: false,
                message: Some(format!("Migration '{}' not found", version)),
                migrations: None,
                steps: None,
            });
        }
    };

    let steps = entry
        .migration
        .steps()
        .iter()
        .map(|step| StepInfo {
            name: step.name().to_string(),
            title: step.title().to_string(),
            resave: step.is_resave(),
        })
        .collect();

    output(Response {
        success: true,
        message: None,
        migrations: None,
        steps: Some(steps),
    })
}

async fn cmd_run(
    version: &str,
    skip_resave: bool,
    page_size: Option<u32>,
    prefix: Option<String>,
    log_progress: bool,
) -> Result<()> {
    let entry =
        find_migration(version).ok_or_else(|| anyhow!("Migration '{}' not found", version))?;

    let mut config = Config::from_env()?;
    if let Some(page_size) = page_size {
        config.page_size = page_size.max(1);
    }
    if let Some(prefix) = prefix {
        config.db_prefix = prefix;
    }

    let db = MySqlDatabase::connect(&config.database_url, &config.db_prefix)
        .await
        .context("Failed to connect to database")?;

    let progress: Arc<dyn BaseProgress> = if log_progress {
        Arc::new(TracingProgress::new())
    } else {
        Arc::new(ConsoleProgress::new())
    };

    // No admin model in a standalone process; resave steps need --skip-resave
    let deps = MigrationDeps::new(Arc::new(db), progress)
        .with_page_size(config.page_size)
        .with_component(&config.component);

    let mut runner = MigrationRunner::for_migration(entry.migration.as_ref());
    if skip_resave {
        runner = runner.without_resave();
    }

    tracing::info!(
        version,
        prefix = %config.db_prefix,
        page_size = config.page_size,
        steps = runner.step_names().len(),
        "starting migration"
    );

    let report = runner
        .run(&deps)
        .await
        .with_context(|| format!("Migration {} failed", version))?;

    print_report(version, &report);
    Ok(())
}

fn print_report(version: &str, report: &RunReport) {
    println!();
    for step in &report.steps {
        let marker = if step.summary.already_current {
            style("~").dim()
        } else {
            style("✓").green()
        };
        println!(
            "  {} {} ({} scanned, {} written, {} DDL, {:.1}s)",
            marker,
            step.name,
            step.summary.rows_scanned,
            step.summary.writes(),
            step.summary.ddl_statements,
            step.elapsed.as_secs_f64()
        );
    }

    let total = report.total();
    println!();
    println!(
        "  {} Migration {} complete: {} rows written, {} DDL statements",
        style("✓").green(),
        style(version).bold(),
        style(total.writes()).bold(),
        style(total.ddl_statements).bold()
    );
    if total.rows_skipped > 0 {
        println!(
            "  {} {} rows were left unchanged because of unrecognized legacy values",
            style("!").yellow(),
            style(total.rows_skipped).yellow()
        );
    }
}
