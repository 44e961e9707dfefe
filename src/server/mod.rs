//! HTTP boundary: heartbeat ingest, status dashboard and metrics.
//!
//! | Route              | Method | Purpose                     |
//! |--------------------|--------|-----------------------------|
//! | `/alive`           | POST   | heartbeat from a client     |
//! | `/`                | GET    | HTML status of every client |
//! | `/metrics`         | GET    | Prometheus exposition       |

mod dashboard;
mod ingest;
mod routes;
pub use dashboard::*;
pub use ingest::*;
pub use routes::*;


use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::AlerterConfig;
use crate::Error;
use crate::Result;
use crate::StateStore;
use crate::WatchConfig;

/// State shared by every request handler.
pub struct ServerContext {
    pub(crate) ingest: HeartbeatIngest,
    pub(crate) store: Arc<StateStore>,
    pub(crate) watch: WatchConfig,
    pub(crate) metrics_enabled: bool,
}

impl ServerContext {
    pub fn new(
        config: &AlerterConfig,
        store: Arc<StateStore>,
    ) -> Self {
        Self {
            ingest: HeartbeatIngest::new(store.clone(), config.watch.clients.clone()),
            store,
            watch: config.watch.clone(),
            metrics_enabled: config.server.metrics_enabled,
        }
    }
}

/// Serves every route on `addr` until `shutdown_rx` changes or its sender is
/// dropped.
pub async fn serve(
    ctx: Arc<ServerContext>,
    addr: SocketAddr,
    mut shutdown_rx: watch::Receiver<()>,
) -> Result<()> {
    let (bound, server) = warp::serve(routes(ctx))
        .try_bind_with_graceful_shutdown(addr, async move {
            let _ = shutdown_rx.changed().await;
        })
        .map_err(|e| Error::Fatal(format!("cannot listen on {}: {}", addr, e)))?;

    info!("HTTP server listening on {}", bound);
    server.await;
    info!("HTTP server stopped");
    Ok(())
}
