//! Client-role handler: attach to a registered code.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, info, warn};
use tunnel_relay::run_pumps;

use crate::error::ServerError;
use crate::state::ServerState;
use crate::ws::{accept_ws, send_status};

/// Attach to the session registered under `code`, or answer 404.
///
/// The pump pair runs on the session's client task group so the server side
/// can wait for it during teardown; this handler awaits it as well.
pub async fn handle_client<S>(
    stream: S,
    head: Bytes,
    code: String,
    path: String,
    state: Arc<ServerState>,
    peer: SocketAddr,
) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let session = match state.registry.lookup(&code) {
        Some(session) if session.is_active() => session,
        _ => {
            debug!(peer = %peer, code = %code, "no active session for code");
            return send_status(stream, StatusCode::NOT_FOUND).await;
        }
    };
    debug!(peer = %peer, code = %code, path = %path, "client attaching");

    let ws = accept_ws(stream, head, &state.websocket).await?;
    info!(peer = %peer, code = %code, session_id = session.id(), "client attached");

    let idle_timeout = state.idle_timeout;
    let pumps = {
        let session = session.clone();
        session.clients().clone().spawn(async move {
            let cancel = session.cancel_token();
            // One client drains stc at a time; a later client waits here.
            let consumer = match session.stc().try_consumer() {
                Some(consumer) => consumer,
                None => {
                    info!(
                        peer = %peer,
                        code = %session.code(),
                        session_id = session.id(),
                        "client queued behind attached client"
                    );
                    tokio::select! {
                        consumer = session.stc().consumer() => consumer,
                        _ = cancel.cancelled() => return None,
                    }
                }
            };
            let producer = session.cts().participant();
            Some(run_pumps(ws, producer, consumer, idle_timeout, cancel).await)
        })
    };

    match pumps.await {
        Ok(Some(outcome)) => info!(
            peer = %peer,
            code = %code,
            session_id = session.id(),
            frames_in = outcome.frames_in,
            frames_out = outcome.frames_out,
            bytes_in = outcome.bytes_in,
            bytes_out = outcome.bytes_out,
            end = ?outcome.end,
            "client detached"
        ),
        Ok(None) => debug!(peer = %peer, code = %code, "session cancelled before attach"),
        Err(err) => warn!(peer = %peer, code = %code, error = %err, "client pump task failed"),
    }
    Ok(())
}
