//! Server state shared across connections.

use std::sync::Arc;
use std::time::Duration;

use tunnel_config::{Config, WebSocketConfig};
use tunnel_core::DEFAULT_HEADER_TIMEOUT_SECS;
use tunnel_relay::SessionRegistry;

/// Shared server state for all connections.
pub struct ServerState {
    pub registry: Arc<SessionRegistry>,
    pub max_header_bytes: usize,
    pub header_timeout: Duration,
    pub channel_capacity: usize,
    /// Per-connection idle limit (None = disabled).
    pub idle_timeout: Option<Duration>,
    pub teardown_grace: Duration,
    pub websocket: WebSocketConfig,
}

impl ServerState {
    pub fn from_config(config: &Config, registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            max_header_bytes: config.server.max_header_bytes,
            header_timeout: Duration::from_secs(DEFAULT_HEADER_TIMEOUT_SECS),
            channel_capacity: config.relay.channel_capacity,
            idle_timeout: config.relay.idle_timeout(),
            teardown_grace: config.relay.teardown_grace(),
            websocket: config.websocket.clone(),
        }
    }
}
