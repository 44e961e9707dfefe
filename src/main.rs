use std::sync::Arc;

use clap::Parser;
use deadman::metrics;
use deadman::spawn_watchdogs;
use deadman::AlerterConfig;
use deadman::ChannelSender;
use deadman::Error;
use deadman::NotificationDispatcher;
use deadman::Result;
use deadman::ServerContext;
use deadman::ShutdownCoordinator;
use deadman::StateStore;
use deadman::SystemClock;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Dead-man's-switch watchdog: alerts when monitored clients stop sending
/// heartbeats.
#[derive(Debug, Parser)]
#[command(name = "deadman", version, about)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON). Falls back to `CONFIG_PATH`.
    #[arg(short, long)]
    config: Option<String>,

    /// Log level, overriding the configured one. `RUST_LOG` wins over both.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = AlerterConfig::load(cli.config.as_deref())?.validate()?;

    // Initializing Logs
    init_observability(cli.log_level.as_deref().unwrap_or(&settings.log_level))?;
    info!("starting with {:?}", settings);

    // Build State
    let clock = Arc::new(SystemClock::new()?);
    let store = Arc::new(StateStore::initialize(
        clock,
        settings.watch.clients.keys().cloned(),
        settings.watch.wait_for_first_connection,
        &settings.watch.snapshot_file,
    ));
    let sender = Arc::new(ChannelSender::new(settings.notify.send_timeout)?);
    let dispatcher = Arc::new(NotificationDispatcher::new(
        sender,
        settings.notify.destinations.clone(),
    ));

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    metrics::ensure_registered();
    let _watchdogs = spawn_watchdogs(&settings, &store, &dispatcher);

    let ctx = Arc::new(ServerContext::new(&settings, store.clone()));
    let listen_address = settings.server.listen_address;
    tokio::spawn(async move {
        if let Err(e) = deadman::serve(ctx, listen_address, graceful_rx).await {
            // Without ingest every client would be reported down.
            error!("HTTP server failed: {:?}", e);
            std::process::exit(1);
        }
    });

    info!(
        "deadman started: {} clients, {} destinations, snapshot at {:?}. Waiting for signals...",
        settings.watch.clients.len(),
        dispatcher.destinations().len(),
        store.snapshot_path()
    );
    let code = ShutdownCoordinator::new(store, dispatcher, graceful_tx)
        .listen()
        .await?;

    info!("Exiting with code {}", code);
    std::process::exit(code);
}

fn init_observability(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| Error::InvalidConfig(format!("invalid log level {:?}: {}", level, e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| Error::Fatal(format!("cannot install log subscriber: {}", e)))
}
