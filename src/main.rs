use clap::Parser;
use sacco_webhook::cli::{CallbackCommands, Cli, Commands, DbCommands, TxCommands};
use sacco_webhook::config::{Config, LogFormat};
use sacco_webhook::{cli, create_app, db, AppState};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Setup logging
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve) | None => serve(config).await,
        Some(Commands::Callbacks(CallbackCommands::Resume)) => {
            let store = db::open_store(&config).await?;
            cli::handle_callbacks_resume(store, &config).await
        }
        Some(Commands::Callbacks(CallbackCommands::Stats)) => {
            let store = db::open_store(&config).await?;
            cli::handle_callbacks_stats(store).await
        }
        Some(Commands::Tx(TxCommands::Status { reference })) => {
            let store = db::open_store(&config).await?;
            cli::handle_tx_status(store, &reference).await
        }
        Some(Commands::Tx(TxCommands::Retry { reference, phone })) => {
            let store = db::open_store(&config).await?;
            cli::handle_tx_retry(store, &reference, &phone).await
        }
        Some(Commands::Db(DbCommands::Migrate)) => cli::handle_db_migrate(&config).await,
        Some(Commands::Config) => cli::handle_config_validate(&config),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let store = db::open_store(&config).await?;
    store
        .ping()
        .await
        .map_err(|e| anyhow::anyhow!("Store is not reachable: {}", e))?;

    let state = AppState::new(store, &config);

    // Finish anything a previous run left half-applied.
    let engine = state.engine.clone();
    tokio::spawn(async move {
        match engine.resume_unfinished().await {
            Ok(report) if report.resumed + report.failed > 0 => tracing::info!(
                resumed = report.resumed,
                failed = report.failed,
                "Startup resume finished"
            ),
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "Startup resume failed"),
        }
    });

    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!(service = %config.service_name, environment = ?config.environment, "listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
