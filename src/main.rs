//! memgov - Memory governance and reasoning pipeline
//!
//! Command-line front end over the governance context: scan for drift,
//! write records, run consolidation and evolution cycles, ask for governed
//! decisions, or keep the maintenance loop running as a daemon.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use memgov::{
    config::GovernanceConfig,
    consolidation::ConsolidationTrigger,
    maintenance::spawn_maintenance_loop,
    memory::{RiskLevel, Scope},
    reasoning::ReasoningRequest,
    GovernanceContext,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "memgov")]
#[command(author = "A3S Lab Team")]
#[command(version)]
#[command(about = "Memory governance and reasoning pipeline for autonomous build agents")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "MEMGOV_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the drift monitor and print the report
    Scan,

    /// Write a memory record
    Write {
        /// Scope: global, agent or project:<id>
        #[arg(short, long, default_value = "global")]
        scope: String,

        /// Record key
        #[arg(short, long)]
        key: String,

        /// JSON value; plain text is stored as a string
        #[arg(long)]
        value: String,

        /// Tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Author recorded on the entry
        #[arg(long, default_value = "cli")]
        created_by: String,
    },

    /// Run a consolidation cycle
    Consolidate {
        /// Only run when the record-count trigger fires
        #[arg(long)]
        if_due: bool,
    },

    /// Run an evolution cycle
    Evolve,

    /// Ask for a governed decision
    Reason {
        /// Intent key (bug_fix, feature, refactor, deployment, qa, planning, governance)
        #[arg(short, long)]
        intent: String,

        /// Free-text description of the work
        #[arg(short, long)]
        description: Option<String>,

        /// Project the work belongs to
        #[arg(short, long)]
        project: Option<String>,

        /// Tag describing the work (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        phase: Option<String>,

        #[arg(long)]
        subsystem: Option<String>,

        /// low, medium, high or critical
        #[arg(short, long, default_value = "medium")]
        risk: String,

        #[arg(long)]
        max_results: Option<usize>,

        /// Skip the drift pre-check
        #[arg(long)]
        skip_drift_check: bool,
    },

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },

    /// Run the maintenance loop until Ctrl+C
    Daemon {
        /// Override the maintenance interval in seconds
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("memgov={}", log_level).into());
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    // Load configuration
    let config = match &cli.config {
        Some(path) => GovernanceConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => GovernanceConfig::default(),
    };

    match cli.command {
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
        Commands::Scan => {
            let ctx = GovernanceContext::open(config).await?;
            print_json(&ctx.scan_drift().await)?;
        }
        Commands::Write {
            scope,
            key,
            value,
            tags,
            created_by,
        } => {
            let ctx = GovernanceContext::open(config).await?;
            let scope: Scope = scope.parse()?;
            let value = serde_json::from_str(&value).unwrap_or(serde_json::Value::String(value));
            let record = ctx
                .store()
                .write(scope, &key, value, tags, &created_by)
                .await?;
            print_json(&record)?;
        }
        Commands::Consolidate { if_due } => {
            let ctx = GovernanceContext::open(config).await?;
            if if_due {
                match ctx.consolidate_if_due().await? {
                    Some(report) => print_json(&report)?,
                    None => println!("Consolidation not due"),
                }
            } else {
                print_json(&ctx.consolidate(ConsolidationTrigger::Manual).await?)?;
            }
        }
        Commands::Evolve => {
            let ctx = GovernanceContext::open(config).await?;
            print_json(&ctx.evolve().await?)?;
        }
        Commands::Reason {
            intent,
            description,
            project,
            tags,
            phase,
            subsystem,
            risk,
            max_results,
            skip_drift_check,
        } => {
            let ctx = GovernanceContext::open(config).await?;
            let risk: RiskLevel = risk.parse()?;
            let request = ReasoningRequest {
                intent,
                description,
                project_id: project,
                tags,
                phase,
                subsystem,
                risk_level: Some(risk),
                max_results,
                skip_memory: false,
                skip_drift_check,
            };
            print_json(&ctx.reason(&request).await?)?;
        }
        Commands::Daemon { interval } => {
            run_daemon(config, interval).await?;
        }
    }

    Ok(())
}

async fn run_daemon(mut config: GovernanceConfig, interval: Option<u64>) -> Result<()> {
    tracing::info!("Starting memgov maintenance daemon");

    config.maintenance.enabled = true;
    if let Some(secs) = interval {
        config.maintenance.interval_secs = secs;
    }
    let ctx = Arc::new(GovernanceContext::open(config).await?);
    let handle = spawn_maintenance_loop(ctx.clone());

    tracing::info!("memgov daemon is running. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");
    if let Some(handle) = handle {
        handle.abort();
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn show_config(config: Option<&GovernanceConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    println!("{}", config.to_toml()?);
    Ok(())
}
