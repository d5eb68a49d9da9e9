//! CLI override definitions and application logic.

use clap::Parser;

use crate::Config;
use crate::loader::normalize_listen;

#[derive(Debug, Clone, Parser, Default)]
pub struct CliOverrides {
    /// Override listen address, e.g. 0.0.0.0:4000 or :4000
    #[arg(long)]
    pub listen: Option<String>,
    /// Override maximum concurrent connections (0 = unlimited)
    #[arg(long)]
    pub max_connections: Option<usize>,
    /// Override maximum request head bytes
    #[arg(long)]
    pub max_header_bytes: Option<usize>,
    /// Override per-direction channel capacity (frames)
    #[arg(long)]
    pub channel_capacity: Option<usize>,
    /// Override idle timeout in seconds (0 = disabled)
    #[arg(long)]
    pub idle_timeout_secs: Option<u64>,
    /// Override session teardown grace period (milliseconds)
    #[arg(long)]
    pub teardown_grace_ms: Option<u64>,
    /// Override WebSocket max frame bytes
    #[arg(long)]
    pub ws_max_frame_bytes: Option<usize>,
    /// Override log level (trace/debug/info/warn/error)
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) {
    if let Some(v) = &overrides.listen {
        config.server.listen = normalize_listen(v);
    }
    if let Some(v) = overrides.max_connections {
        config.server.max_connections = if v == 0 { None } else { Some(v) };
    }
    if let Some(v) = overrides.max_header_bytes {
        config.server.max_header_bytes = v;
    }
    if let Some(v) = overrides.channel_capacity {
        config.relay.channel_capacity = v;
    }
    if let Some(v) = overrides.idle_timeout_secs {
        config.relay.idle_timeout_secs = v;
    }
    if let Some(v) = overrides.teardown_grace_ms {
        config.relay.teardown_grace_ms = v;
    }
    if let Some(v) = overrides.ws_max_frame_bytes {
        config.websocket.max_frame_bytes = v;
    }
    if let Some(v) = &overrides.log_level {
        config.logging.level = Some(v.clone());
    }
}
