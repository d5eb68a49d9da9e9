//! Request head inspection and the WebSocket upgrade.
//!
//! The head is read and routed before any upgrade, so unknown codes and
//! malformed paths are answered with a plain HTTP status. Accepted
//! connections replay the buffered head into the handshake.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_tungstenite::{
    WebSocketStream, accept_hdr_async_with_config,
    tungstenite::{
        handshake::server::{Request, Response},
        http::StatusCode,
        protocol::WebSocketConfig,
    },
};
use tracing::debug;
use tunnel_config::WebSocketConfig as WsCfg;

use crate::error::ServerError;
use crate::router::{Route, route_path};
use crate::util::PrefixedStream;

/// Initial buffer size for reading the request head.
pub const INITIAL_BUFFER_SIZE: usize = 2048;

const HTTP_HEADER_END: &[u8] = b"\r\n\r\n";

/// Result of inspecting the buffered request head.
#[derive(Debug, PartialEq, Eq)]
pub enum Inspect {
    /// Head not complete yet.
    NeedMore,
    /// Not an HTTP request line.
    NotHttp,
    /// Answer with this status and close.
    Reject(StatusCode),
    /// Dispatch to a role handler.
    Route(Route),
}

/// Inspect buffered bytes for a complete request head and route it.
pub fn inspect_request(buf: &[u8]) -> Inspect {
    let Some(header_end) = find_header_end(buf) else {
        return Inspect::NeedMore;
    };
    let Ok(head) = std::str::from_utf8(&buf[..header_end]) else {
        return Inspect::NotHttp;
    };
    let request_line = head.split("\r\n").next().unwrap_or("");

    let mut parts = request_line.split_whitespace();
    let _method = parts.next().unwrap_or("");
    let target = parts.next().unwrap_or("");
    let version = parts.next().unwrap_or("");
    if !version.starts_with("HTTP/") {
        return Inspect::NotHttp;
    }

    match route_path(target) {
        Some(route) => Inspect::Route(route),
        None => Inspect::Reject(StatusCode::BAD_REQUEST),
    }
}

/// Complete the WebSocket handshake, replaying `initial` first.
pub async fn accept_ws<S>(
    stream: S,
    initial: Bytes,
    cfg: &WsCfg,
) -> Result<WebSocketStream<PrefixedStream<S>>, ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let max_frame = Some(cfg.max_frame_bytes);
    let ws_cfg = WebSocketConfig {
        max_frame_size: max_frame,
        max_message_size: max_frame,
        ..WebSocketConfig::default()
    };
    let prefixed = PrefixedStream::new(initial, stream);
    let ws = accept_hdr_async_with_config(
        prefixed,
        |req: &Request, resp: Response| {
            debug!(path = %req.uri().path(), "websocket upgrade");
            Ok(resp)
        },
        Some(ws_cfg),
    )
    .await?;
    Ok(ws)
}

/// Answer with a bare status response and close the stream.
pub async fn send_status<S>(mut stream: S, status: StatusCode) -> Result<(), ServerError>
where
    S: AsyncWrite + Unpin,
{
    let reason = status.canonical_reason().unwrap_or("");
    let body = format!("{reason}\n");
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status.as_u16(),
        reason,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HTTP_HEADER_END.len())
        .position(|w| w == HTTP_HEADER_END)
        .map(|idx| idx + HTTP_HEADER_END.len())
}
