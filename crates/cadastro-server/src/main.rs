//! Cadastro Server - Main entry point

use anyhow::{Context, Result};
use cadastro_common::logging::{init_logging, LogConfig};
use clap::{Parser, Subcommand};
use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use cadastro_server::{
    api::{self, AppState},
    config::Config,
    ingest::{IngestOrchestrator, Scheduler},
    publisher::{KafkaBroker, Publisher},
    storage::Storage,
};

#[derive(Parser, Debug)]
#[command(name = "cadastro-server", version, about = "CSV to Kafka ingestion service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the periodic ingestion and the HTTP API (default)
    Serve,
    /// Run a single discovery pass and exit
    RunOnce,
    /// Process one object and exit
    Process {
        /// Object key of the file to process
        key: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .log_file_prefix("cadastro-server")
        .filter_directives("cadastro_server=debug,tower_http=debug,rdkafka=info,aws_smithy_runtime=info")
        .build();

    let log_config = match LogConfig::from_env_or(log_config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: invalid logging configuration: {:#}", e);
            return ExitCode::FAILURE;
        },
    };

    let _log_guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {:#}", e);
            return ExitCode::FAILURE;
        },
    };

    match run(cli.command.unwrap_or(Command::Serve)).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        },
    }
}

/// Run `command`, returning whether every processed file succeeded
async fn run(command: Command) -> Result<bool> {
    info!("Starting cadastro server");

    let config = Config::load().context("Failed to load configuration")?;
    info!(
        bucket = %config.storage.bucket,
        topic = %config.kafka.topic,
        suffix = %config.ingest.file_suffix,
        "Configuration loaded"
    );

    let storage = Storage::new(config.storage.clone())
        .await
        .context("Failed to initialize storage")?;
    let broker = Arc::new(KafkaBroker::new(&config.kafka).context("Failed to create Kafka producer")?);
    let publisher = Publisher::new(
        broker,
        config.kafka.topic.clone(),
        config.ingest.send_timeout(),
    );

    let shutdown = CancellationToken::new();
    let orchestrator = Arc::new(IngestOrchestrator::new(
        Arc::new(storage),
        publisher.clone(),
        config.ingest.clone(),
        shutdown.clone(),
    ));

    let clean = match command {
        Command::Serve => {
            serve(&config, orchestrator, shutdown).await?;
            true
        },
        Command::RunOnce => {
            let summary = orchestrator.run_pass().await;
            summary.is_clean()
        },
        Command::Process { key } => orchestrator.process_file(&key).await.is_success(),
    };

    if let Err(e) = publisher.flush(config.server.shutdown_timeout()).await {
        warn!(error = %e, "Producer flush did not complete");
    }

    info!("Cadastro server stopped");
    Ok(clean)
}

async fn serve(
    config: &Config,
    orchestrator: Arc<IngestOrchestrator>,
    shutdown: CancellationToken,
) -> Result<()> {
    let scheduler_handle = if config.ingest.enabled {
        let scheduler =
            Scheduler::new(orchestrator.clone(), config.ingest.interval(), shutdown.clone());
        Some(scheduler.start())
    } else {
        info!("Periodic ingestion is disabled (INGEST_ENABLED=false)");
        None
    };

    let app = api::router(AppState {
        orchestrator,
        service_name: config.server.service_name.clone(),
    });

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on {}", addr);

    let signal_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal_token.cancel();
        })
        .await?;

    // the server only returns early on error; make sure the scheduler stops too
    shutdown.cancel();

    if let Some(handle) = scheduler_handle {
        match tokio::time::timeout(config.server.shutdown_timeout(), handle).await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => error!("Scheduler task failed: {}", e),
            Err(_) => warn!(
                "Scheduler did not stop within {} seconds",
                config.server.shutdown_timeout_secs
            ),
        }
    }

    info!("Server shut down gracefully");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = until_signal("Ctrl+C", signal::ctrl_c());

    #[cfg(unix)]
    let terminate = until_signal("SIGTERM", async {
        signal::unix::signal(signal::unix::SignalKind::terminate())?
            .recv()
            .await;
        Ok::<(), std::io::Error>(())
    });

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}

/// Resolve once the signal arrives, or never if its handler could not be installed
async fn until_signal(name: &str, installed: impl Future<Output = std::io::Result<()>>) {
    if let Err(e) = installed.await {
        error!("Failed to install {} handler: {}", name, e);
        std::future::pending::<()>().await;
    }
}
