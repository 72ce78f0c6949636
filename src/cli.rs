use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::config::Config;
use crate::ports::SaccoStore;
use crate::services::{CallbackStore, ReconciliationEngine, RetryService, TransactionLocator};

#[derive(Parser)]
#[command(name = "sacco-webhook")]
#[command(about = "Smart SACCO Webhook Server - MoMo callback reconciliation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Stored callback commands
    #[command(subcommand)]
    Callbacks(CallbackCommands),

    /// Transaction management commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum CallbackCommands {
    /// Finish reconciling callbacks left unprocessed by a crash or failed write
    Resume,

    /// Show callback counters
    Stats,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Show the transaction carrying a provider reference
    Status {
        #[arg(value_name = "REFERENCE")]
        reference: String,
    },

    /// Record a payment retry request
    Retry {
        #[arg(value_name = "REFERENCE")]
        reference: String,

        /// Phone number to retry the payment from
        #[arg(short, long)]
        phone: String,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

pub async fn handle_callbacks_resume(
    store: Arc<dyn SaccoStore>,
    config: &Config,
) -> anyhow::Result<()> {
    let engine = ReconciliationEngine::new(store, config.notification_failure_policy);

    tracing::info!("Resuming unfinished callbacks...");
    let report = engine.resume_unfinished().await?;

    println!("✓ Resumed {} callback(s)", report.resumed);
    if report.failed > 0 {
        println!("✗ {} callback(s) still failing, see logs", report.failed);
        anyhow::bail!("{} callback(s) could not be reconciled", report.failed);
    }
    Ok(())
}

pub async fn handle_callbacks_stats(store: Arc<dyn SaccoStore>) -> anyhow::Result<()> {
    let counts = CallbackStore::new(store).counts().await?;

    println!("Callbacks:");
    println!("  Total: {}", counts.total);
    println!("  Processed: {}", counts.processed);
    println!("  Pending: {}", counts.pending());
    Ok(())
}

pub async fn handle_tx_status(store: Arc<dyn SaccoStore>, reference: &str) -> anyhow::Result<()> {
    let locator = TransactionLocator::new(store);

    match locator.find_by_reference(reference).await? {
        Some(tx) => {
            println!("Transaction {}:", tx.id);
            println!("  User: {}", tx.user_id);
            println!("  Reference: {}", tx.reference);
            println!("  Status: {}", tx.status);
            println!("  Amount: {}", tx.amount);
            println!("  Retries: {}", tx.retry_count);
            if let Some(error) = &tx.error {
                println!("  Error: {}", error);
            }
            Ok(())
        }
        None => {
            tracing::warn!("Transaction {} not found", reference);
            anyhow::bail!("Transaction {} not found", reference)
        }
    }
}

pub async fn handle_tx_retry(
    store: Arc<dyn SaccoStore>,
    reference: &str,
    phone: &str,
) -> anyhow::Result<()> {
    let tx = RetryService::new(store).initiate_retry(reference, phone).await?;

    println!(
        "✓ Retry recorded for transaction {} (retry #{})",
        tx.id, tx.retry_count
    );
    Ok(())
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let Some(url) = config.database_url.as_deref() else {
        anyhow::bail!("DATABASE_URL is not set; nothing to migrate");
    };

    let pool = crate::db::create_pool(config, url).await?;
    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool, &config.migrations_dir).await?;

    println!("✓ Database migrations completed");
    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    match &config.database_url {
        Some(url) => println!("  Database URL: {}", mask_password(url)),
        None => println!("  Database URL: (unset, in-memory store)"),
    }
    println!("  Max Connections: {}", config.database_max_connections);
    println!("  Environment: {:?}", config.environment);
    println!("  Service Name: {}", config.service_name);
    println!(
        "  Notification Failure Policy: {:?}",
        config.notification_failure_policy
    );
    println!("  Log Format: {:?}", config.log_format);

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
