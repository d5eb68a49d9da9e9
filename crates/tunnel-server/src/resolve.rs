//! Listen address resolution.

use std::net::SocketAddr;

use tunnel_config::normalize_listen;

use crate::error::ServerError;

/// Resolve the configured listen address to a socket address.
///
/// Accepts `host:port`, `[v6]:port`, or `:port` (all interfaces). Host names
/// are resolved and the first result is used.
pub async fn resolve_listen(listen: &str) -> Result<SocketAddr, ServerError> {
    let listen = normalize_listen(listen.trim());
    if let Ok(addr) = listen.parse::<SocketAddr>() {
        return Ok(addr);
    }
    tokio::net::lookup_host(listen.as_str())
        .await
        .map_err(|e| ServerError::Config(format!("invalid listen address {listen:?}: {e}")))?
        .next()
        .ok_or_else(|| ServerError::Config(format!("listen address {listen:?} did not resolve")))
}
