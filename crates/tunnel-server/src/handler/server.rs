//! Server-role handler: register a code and serve it.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};
use tunnel_relay::{RelaySession, run_pumps};

use crate::error::ServerError;
use crate::state::ServerState;
use crate::ws::accept_ws;

/// Register `code`, upgrade the connection and relay until it ends.
///
/// The session is registered before the upgrade so a client arriving
/// concurrently can already find it. Once the server connection ends the
/// session stops accepting clients and is retired from the registry.
pub async fn handle_server<S>(
    stream: S,
    head: Bytes,
    code: String,
    state: Arc<ServerState>,
    peer: SocketAddr,
) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (session, stc_owner) =
        RelaySession::with_cancel(code, state.channel_capacity, state.registry.session_token());
    if let Some(previous) = state.registry.register(session.clone()) {
        info!(
            code = %session.code(),
            previous_id = previous.id(),
            session_id = session.id(),
            "code re-registered, replacing session"
        );
    }

    let ws = match accept_ws(stream, head, &state.websocket).await {
        Ok(ws) => ws,
        Err(err) => {
            warn!(peer = %peer, code = %session.code(), error = %err, "server upgrade failed");
            // A client may have attached in the meantime; release it.
            session.cancel();
            stc_owner.close();
            state.registry.remove(&session);
            return Err(err);
        }
    };
    info!(peer = %peer, code = %session.code(), session_id = session.id(), "server registered");

    let consumer = session.cts().consumer().await;
    let outcome = run_pumps(
        ws,
        stc_owner,
        consumer,
        state.idle_timeout,
        session.cancel_token(),
    )
    .await;
    info!(
        peer = %peer,
        code = %session.code(),
        session_id = session.id(),
        frames_in = outcome.frames_in,
        frames_out = outcome.frames_out,
        bytes_in = outcome.bytes_in,
        bytes_out = outcome.bytes_out,
        end = ?outcome.end,
        "server disconnected"
    );

    state.registry.retire(&session, state.teardown_grace).await;
    Ok(())
}
