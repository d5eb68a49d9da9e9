//! Accept loop and graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use tunnel_config::Config;
use tunnel_core::DEFAULT_SHUTDOWN_TIMEOUT_SECS;
use tunnel_relay::SessionRegistry;

use crate::error::ServerError;
use crate::handler::handle_conn;
use crate::resolve::resolve_listen;
use crate::state::ServerState;
use crate::util::create_listener;

/// Default graceful shutdown timeout.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS);

/// Run the relay until `shutdown` is cancelled.
///
/// On shutdown the accept loop stops, every session is cancelled and active
/// connections get up to [`DEFAULT_SHUTDOWN_TIMEOUT`] to finish.
pub async fn run_with_shutdown(
    config: Config,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let listen = resolve_listen(&config.server.listen).await?;

    let registry = Arc::new(SessionRegistry::new());
    let state = Arc::new(ServerState::from_config(&config, registry.clone()));
    let connections = TaskTracker::new();

    // Connection limiter (None = unlimited)
    let conn_limit: Option<Arc<Semaphore>> = config.server.max_connections.map(|n| {
        info!(max_connections = n, "connection limit enabled");
        Arc::new(Semaphore::new(n))
    });

    let backlog = config.server.connection_backlog;
    let listener = create_listener(listen, backlog)?;
    info!(
        address = %listen,
        backlog,
        channel_capacity = state.channel_capacity,
        "listening"
    );

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }

            result = listener.accept() => {
                let (tcp, peer) = match result {
                    Ok(v) => v,
                    Err(err) => {
                        // Per-connection accept errors (e.g. ECONNABORTED) are not fatal.
                        warn!(error = %err, "accept failed");
                        continue;
                    }
                };

                let permit: Option<OwnedSemaphorePermit> = match &conn_limit {
                    Some(sem) => match sem.clone().try_acquire_owned() {
                        Ok(p) => Some(p),
                        Err(_) => {
                            debug!(peer = %peer, reason = "max_connections", "connection rejected");
                            drop(tcp);
                            continue;
                        }
                    },
                    None => None,
                };

                debug!(peer = %peer, "new connection");
                let _ = tcp.set_nodelay(true);
                let state = state.clone();

                connections.spawn(async move {
                    let _permit = permit; // held until the connection ends
                    let start = Instant::now();
                    let result = handle_conn(tcp, state, peer).await;
                    let duration_secs = start.elapsed().as_secs_f64();

                    match result {
                        Ok(()) => debug!(peer = %peer, duration_secs, "connection closed"),
                        Err(err) => warn!(
                            peer = %peer,
                            duration_secs,
                            error = %err,
                            error_type = err.error_type(),
                            "connection closed with error"
                        ),
                    }
                });
            }
        }
    }

    drop(listener);
    info!(sessions = registry.len(), "cancelling relay sessions");
    registry.shutdown();
    connections.close();

    let active = connections.len();
    if active > 0 {
        info!(active, "waiting for active connections to drain");
        if tokio::time::timeout(DEFAULT_SHUTDOWN_TIMEOUT, connections.wait())
            .await
            .is_ok()
        {
            info!("all connections drained");
        } else {
            warn!(
                active = connections.len(),
                "shutdown timeout, connections still active"
            );
        }
    }

    info!("server stopped");
    Ok(())
}

/// Run the relay without an external shutdown trigger.
pub async fn run(config: Config) -> Result<(), ServerError> {
    run_with_shutdown(config, CancellationToken::new()).await
}
