//! Connection handlers for the two relay roles.

mod client;
mod server;

pub use client::handle_client;
pub use server::handle_server;

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, warn};

use crate::error::ServerError;
use crate::router::Route;
use crate::state::ServerState;
use crate::ws::{INITIAL_BUFFER_SIZE, Inspect, inspect_request, send_status};

/// Outcome of reading the request head.
enum Head {
    Route(Route),
    Reject(StatusCode),
    Drop(&'static str),
}

/// Handle a newly accepted connection: read and route the request head,
/// then hand the stream to the matching role handler.
pub async fn handle_conn<S>(
    mut stream: S,
    state: Arc<ServerState>,
    peer: SocketAddr,
) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUFFER_SIZE);
    let head = tokio::time::timeout(
        state.header_timeout,
        read_head(&mut stream, &mut buf, state.max_header_bytes),
    )
    .await;

    let route = match head {
        Ok(Ok(Head::Route(route))) => route,
        Ok(Ok(Head::Reject(status))) => {
            debug!(peer = %peer, status = status.as_u16(), "request rejected");
            return send_status(stream, status).await;
        }
        Ok(Ok(Head::Drop(reason))) => {
            debug!(peer = %peer, reason, "connection dropped");
            return Ok(());
        }
        Ok(Err(err)) => return Err(err),
        Err(_) => {
            debug!(
                peer = %peer,
                timeout_secs = state.header_timeout.as_secs(),
                "request head timed out"
            );
            return Ok(());
        }
    };

    let head = buf.freeze();
    match route {
        Route::Server { code } => handle_server(stream, head, code, state, peer).await,
        Route::Client { code, path } => handle_client(stream, head, code, path, state, peer).await,
    }
}

async fn read_head<S>(
    stream: &mut S,
    buf: &mut BytesMut,
    max_header_bytes: usize,
) -> Result<Head, ServerError>
where
    S: AsyncRead + Unpin,
{
    loop {
        let n = stream.read_buf(buf).await?;
        if n == 0 {
            return Ok(Head::Drop("eof"));
        }
        match inspect_request(buf) {
            Inspect::Route(route) => return Ok(Head::Route(route)),
            Inspect::Reject(status) => return Ok(Head::Reject(status)),
            Inspect::NotHttp => return Ok(Head::Drop("not_http")),
            Inspect::NeedMore => {
                if buf.len() > max_header_bytes {
                    warn!(bytes = buf.len(), max = max_header_bytes, "request head too large");
                    return Ok(Head::Reject(StatusCode::BAD_REQUEST));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;

    use bytes::Bytes;
    use futures_util::StreamExt;
    use tokio::io::{AsyncReadExt, DuplexStream, ReadBuf};
    use tokio::sync::oneshot;
    use tokio_tungstenite::client_async;
    use tokio_tungstenite::tungstenite::Message;
    use tunnel_config::Config;
    use tunnel_relay::SessionRegistry;

    use super::*;

    const SERVER_UPGRADE: &str = "GET /server/x/ HTTP/1.1\r\n\
        Host: relay\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Version: 13\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n";

    fn test_state() -> Arc<ServerState> {
        Arc::new(ServerState::from_config(
            &Config::default(),
            Arc::new(SessionRegistry::new()),
        ))
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:1".parse().unwrap()
    }

    /// Never yields input; writes hang until `fail` fires, then break.
    struct FailingWrites {
        fail: oneshot::Receiver<()>,
        failed: bool,
    }

    impl AsyncRead for FailingWrites {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Pending
        }
    }

    impl AsyncWrite for FailingWrites {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            _data: &[u8],
        ) -> Poll<io::Result<usize>> {
            if !self.failed {
                if Pin::new(&mut self.fail).poll(cx).is_pending() {
                    return Poll::Pending;
                }
                self.failed = true;
            }
            Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    async fn wait_registered(state: &ServerState, code: &str) {
        for _ in 0..100 {
            if state.registry.lookup(code).is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{code} was never registered");
    }

    async fn read_all(mut stream: DuplexStream) -> String {
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn failed_server_upgrade_releases_attached_client() {
        let state = test_state();
        let (fail_tx, fail_rx) = oneshot::channel();

        let server = tokio::spawn(handle_server(
            FailingWrites {
                fail: fail_rx,
                failed: false,
            },
            Bytes::from_static(SERVER_UPGRADE.as_bytes()),
            "x".into(),
            state.clone(),
            peer(),
        ));
        wait_registered(&state, "x").await;

        // Attach a client while the server's 101 response is still pending.
        let (client_io, relay_io) = tokio::io::duplex(4096);
        let client_handler = tokio::spawn(handle_client(
            relay_io,
            Bytes::new(),
            "x".into(),
            "/".into(),
            state.clone(),
            peer(),
        ));
        let (mut client, _) = client_async("ws://relay/client/x/", client_io)
            .await
            .expect("client upgrade");

        fail_tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(3), server)
            .await
            .expect("server handler hung")
            .unwrap();
        assert!(result.is_err());
        assert!(state.registry.lookup("x").is_none());

        let next = tokio::time::timeout(Duration::from_secs(3), client.next())
            .await
            .expect("client left waiting");
        assert!(matches!(next, None | Some(Ok(Message::Close(_))) | Some(Err(_))));

        let handled = tokio::time::timeout(Duration::from_secs(3), client_handler)
            .await
            .expect("client handler hung")
            .unwrap();
        assert!(handled.is_ok());
    }

    #[tokio::test]
    async fn plain_request_to_server_path_rolls_back() {
        let state = test_state();

        let (_peer_io, relay_io) = tokio::io::duplex(4096);
        let result = handle_server(
            relay_io,
            Bytes::from_static(b"GET /server/x/ HTTP/1.1\r\nHost: relay\r\n\r\n"),
            "x".into(),
            state.clone(),
            peer(),
        )
        .await;
        assert!(result.is_err());
        assert!(state.registry.lookup("x").is_none());

        let (client_io, relay_io) = tokio::io::duplex(4096);
        handle_client(
            relay_io,
            Bytes::new(),
            "x".into(),
            "/".into(),
            state.clone(),
            peer(),
        )
        .await
        .unwrap();
        assert!(read_all(client_io).await.starts_with("HTTP/1.1 404"));
    }

    #[tokio::test]
    async fn conn_routes_unknown_client_to_404() {
        let state = test_state();
        let (mut client_io, relay_io) = tokio::io::duplex(4096);
        let handler = tokio::spawn(handle_conn(relay_io, state, peer()));

        tokio::io::AsyncWriteExt::write_all(
            &mut client_io,
            b"GET /client/nobody/ HTTP/1.1\r\nHost: relay\r\n\r\n",
        )
        .await
        .unwrap();
        assert!(read_all(client_io).await.starts_with("HTTP/1.1 404"));
        assert!(handler.await.unwrap().is_ok());
    }
}
