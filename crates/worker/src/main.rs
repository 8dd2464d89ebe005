//! Worker entry point.

use common::PlayerId;
use tokio::io::BufReader;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use transaction::{Database, InMemoryDatabase, PostgresDatabase, TransactionExecutor};
use worker::{Config, GameCommands, GameStore, LogFormat, Pipeline, Scoreboard, WorkerError};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) -> Result<(), WorkerError> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer())
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    }
    .map_err(|e| WorkerError::Logging(e.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), WorkerError> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env()?;
    init_tracing(&config)?;

    // 2. Install Prometheus exporter
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(config.metrics_addr)
        .install()
        .map_err(|e| WorkerError::Metrics(e.to_string()))?;
    tracing::info!(addr = %config.metrics_addr, "metrics exporter listening");

    // 3. Pick the database and run
    match &config.database_url {
        Some(url) => {
            let database = PostgresDatabase::connect(url).await?;
            tracing::info!("using PostgreSQL database");
            run(&config, database).await
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory database");
            run(&config, InMemoryDatabase::new()).await
        }
    }
}

async fn run<D: Database>(config: &Config, database: D) -> Result<(), WorkerError> {
    // Wire one queue to the bus and the processor
    let scoreboard = Scoreboard::new();
    let pipeline = Pipeline::new(&config.bus, worker::create_registry(&scoreboard))?;
    let bus = pipeline.bus();
    let cancel = CancellationToken::new();
    let running = pipeline.start(cancel.child_token());

    let executor = TransactionExecutor::new(database, bus).with_retry_policy(config.retry_policy());
    let commands = GameCommands::new(executor, GameStore::new());
    let player = PlayerId::new();
    tracing::info!(
        queue_capacity = config.bus.capacity(),
        %player,
        "worker started, reading commands from stdin"
    );

    // Serve console commands until EOF or a shutdown signal
    let console_cancel = cancel.child_token();
    let console = worker::console::run(
        &commands,
        &scoreboard,
        player,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        &console_cancel,
    );
    tokio::select! {
        () = console => {
            tracing::info!("console input closed, shutting down");
        }
        () = shutdown_signal() => {
            console_cancel.cancel();
        }
    }

    // Close the queue, drain it and wait for in-flight handlers
    let summary = running.shutdown().await?;
    tracing::info!(
        events_dequeued = summary.events_dequeued,
        games = scoreboard.game_count().await,
        "worker shut down gracefully"
    );
    Ok(())
}
