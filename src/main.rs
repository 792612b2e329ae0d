//! # FieldOps — automation daemon and CLI
//!
//! Hosts the periodic notification scheduler and exposes on-demand
//! triggers for scheduler runs and workflow executions.
//!
//! Usage:
//!   fieldops serve                          # Run the scheduler daemon
//!   fieldops run --owner <id>               # One scheduler pass, now
//!   fieldops workflow quote_to_job --source <quote-id>
//!   fieldops notifications --owner <id> --unread

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use fieldops_automation::{
    AutomationScheduler, EmailDelivery, Notifier, WebhookDelivery, spawn_scheduler,
};
use fieldops_core::config::FieldOpsConfig;
use fieldops_db::{OpsStore, SqliteStore};
use fieldops_workflow::{WorkflowEngine, WorkflowTemplate};

#[derive(Parser)]
#[command(
    name = "fieldops",
    version,
    about = "🛠️ FieldOps — business automation for small service companies"
)]
struct Cli {
    /// Config file path (default: ~/.fieldops/config.toml)
    #[arg(long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Host the periodic automation scheduler
    Serve {
        /// Override the check interval in seconds
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Run the scheduler once for one recipient
    Run {
        #[arg(long)]
        owner: String,
    },
    /// Execute a workflow template against a source entity
    Workflow {
        /// quote_to_job, job_to_invoice, payment_to_receipt, lead_to_quote, job_complete_flow
        name: String,
        #[arg(long)]
        source: String,
    },
    /// List recent notifications for a recipient
    Notifications {
        #[arg(long)]
        owner: String,
        /// Only unread notifications
        #[arg(long)]
        unread: bool,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Mark a notification as read
    MarkRead { id: String },
}

/// Wire delivery channels from config into a notifier.
fn build_notifier(store: Arc<dyn OpsStore>, config: &FieldOpsConfig) -> Notifier {
    let mut notifier = Notifier::new(store);
    if let Some(email) = &config.email {
        notifier.add_adapter(Arc::new(EmailDelivery::new(email.clone())));
    }
    if let Some(webhook) = &config.webhook {
        notifier.add_adapter(Arc::new(WebhookDelivery::new(webhook.clone())));
    }
    notifier
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "fieldops=debug"
    } else {
        "fieldops=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => FieldOpsConfig::load_from(std::path::Path::new(path))?,
        None => FieldOpsConfig::load()?,
    };

    let db_path = shellexpand::tilde(&config.db_path).to_string();
    let store: Arc<dyn OpsStore> = Arc::new(SqliteStore::open(std::path::Path::new(&db_path))?);

    match cli.command {
        Command::Serve { interval_secs } => {
            if !config.scheduler.enabled {
                anyhow::bail!("Scheduler is disabled in config");
            }
            let interval = interval_secs.unwrap_or(config.scheduler.check_interval_secs);
            let notifier = build_notifier(store.clone(), &config);
            let scheduler = Arc::new(AutomationScheduler::new(store, notifier));
            spawn_scheduler(scheduler, interval).await;
        }
        Command::Run { owner } => {
            let notifier = build_notifier(store.clone(), &config);
            let scheduler = AutomationScheduler::new(store, notifier);
            let summary = scheduler.run(&owner).await?;
            println!(
                "Evaluated {} entities, created {} notifications",
                summary.evaluated, summary.created
            );
        }
        Command::Workflow { name, source } => {
            let template = WorkflowTemplate::parse(&name)
                .ok_or_else(|| anyhow::anyhow!("Unknown workflow template: {name}"))?;
            let notifier = build_notifier(store.clone(), &config);
            let engine = WorkflowEngine::new(store, notifier);
            let result = engine.execute(template, &source).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                std::process::exit(1);
            }
        }
        Command::Notifications {
            owner,
            unread,
            limit,
        } => {
            let notifications = store.recent_notifications(&owner, unread, limit).await?;
            if notifications.is_empty() {
                println!("No notifications");
            }
            for n in notifications {
                let marker = if n.read { " " } else { "•" };
                println!(
                    "{marker} [{}] {} — {} ({}, {})",
                    n.priority.as_str(),
                    n.title(),
                    n.message(),
                    n.kind,
                    n.created_at.format("%Y-%m-%d %H:%M")
                );
                println!("    id: {}  {}: {}", n.id, n.kind.reference_key(), n.reference_id());
            }
        }
        Command::MarkRead { id } => {
            store.mark_notification_read(&id).await?;
            println!("Marked {id} as read");
        }
    }

    Ok(())
}
