//! Connection pumps: move frames between a WebSocket connection and the
//! session channels.
//!
//! Each connection runs a write loop (channel -> connection) and a read loop
//! (connection -> channel) as one unit. Whichever loop ends first ends the
//! pair; the connection is then closed, which in turn ends the peer's pumps
//! once their channel drains or closes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::channel::{Consumer, Producer, Role};
use crate::frame::Frame;

/// Upper bound on the close handshake once a pair has ended.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Why a pump pair stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpEnd {
    /// The connection sent a close frame or reached end of stream.
    PeerClosed,
    /// The channel feeding the write loop was closed and drained, or the
    /// channel fed by the read loop was closed by its owner.
    ChannelClosed,
    WriteFailed,
    ReadFailed,
    IdleTimeout,
    Cancelled,
}

/// Summary of one finished pump pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpOutcome {
    /// Frames read from the connection and enqueued.
    pub frames_in: u64,
    /// Frames dequeued and written to the connection.
    pub frames_out: u64,
    /// Payload bytes of `frames_in`.
    pub bytes_in: u64,
    /// Payload bytes of `frames_out`.
    pub bytes_out: u64,
    pub end: PumpEnd,
}

/// Last time a frame moved in either direction.
struct Activity {
    origin: Instant,
    last_ms: AtomicU64,
}

impl Activity {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_ms: AtomicU64::new(0),
        }
    }

    fn touch(&self) {
        let elapsed = self.origin.elapsed().as_millis() as u64;
        self.last_ms.store(elapsed, Ordering::Relaxed);
    }

    fn last(&self) -> Instant {
        self.origin + Duration::from_millis(self.last_ms.load(Ordering::Relaxed))
    }
}

/// Run the read and write loops for one connection until either ends.
///
/// `producer` receives frames read from `conn`; `consumer` supplies frames
/// written to it. When the pair ends the producer is finished (closing its
/// channel if it is the owner) and the connection is closed.
pub async fn run_pumps<C, R>(
    conn: C,
    producer: Producer<R>,
    mut consumer: Consumer,
    idle_timeout: Option<Duration>,
    cancel: CancellationToken,
) -> PumpOutcome
where
    C: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
    R: Role,
{
    let (mut sink, mut stream) = conn.split();
    let activity = Activity::new();
    let mut inbound = Counts::default();
    let mut outbound = Counts::default();

    let end = tokio::select! {
        end = write_loop(&mut sink, &mut consumer, &activity, &mut outbound) => end,
        end = read_loop(&mut stream, &producer, &activity, &mut inbound) => end,
        _ = idle_watch(&activity, idle_timeout) => PumpEnd::IdleTimeout,
        _ = cancel.cancelled() => PumpEnd::Cancelled,
    };

    debug!(
        role = R::NAME,
        frames_in = inbound.frames,
        frames_out = outbound.frames,
        end = ?end,
        "pump pair ended"
    );

    producer.finish();
    drop(consumer);
    if tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await.is_err() {
        debug!("close handshake timed out");
    }

    PumpOutcome {
        frames_in: inbound.frames,
        frames_out: outbound.frames,
        bytes_in: inbound.bytes,
        bytes_out: outbound.bytes,
        end,
    }
}

#[derive(Default)]
struct Counts {
    frames: u64,
    bytes: u64,
}

impl Counts {
    fn add(&mut self, len: usize) {
        self.frames += 1;
        self.bytes += len as u64;
    }
}

async fn write_loop<S>(
    sink: &mut S,
    consumer: &mut Consumer,
    activity: &Activity,
    counts: &mut Counts,
) -> PumpEnd
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    while let Some(frame) = consumer.recv().await {
        let len = frame.len();
        if let Err(err) = sink.send(frame.into_message()).await {
            debug!(error = %err, "relay write failed");
            return PumpEnd::WriteFailed;
        }
        counts.add(len);
        activity.touch();
    }
    PumpEnd::ChannelClosed
}

async fn read_loop<S, R>(
    stream: &mut S,
    producer: &Producer<R>,
    activity: &Activity,
    counts: &mut Counts,
) -> PumpEnd
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
    R: Role,
{
    while let Some(msg) = stream.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(err) => {
                debug!(error = %err, "relay read failed");
                return PumpEnd::ReadFailed;
            }
        };
        activity.touch();

        if let Message::Close(ref close) = msg {
            debug!(frame = ?close, "peer sent close");
            return PumpEnd::PeerClosed;
        }
        // Ping/pong are answered by the websocket layer itself.
        let Some(frame) = Frame::from_message(msg) else {
            continue;
        };

        let len = frame.len();
        if producer.send(frame).await.is_err() {
            return PumpEnd::ChannelClosed;
        }
        counts.add(len);
    }
    PumpEnd::PeerClosed
}

async fn idle_watch(activity: &Activity, idle_timeout: Option<Duration>) {
    let Some(idle_timeout) = idle_timeout else {
        return std::future::pending().await;
    };
    loop {
        tokio::time::sleep_until(activity.last() + idle_timeout).await;
        if activity.last() + idle_timeout <= Instant::now() {
            return;
        }
    }
}
