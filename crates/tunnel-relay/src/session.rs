//! Relay session: the two directional channels behind one code.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::channel::{MessageChannel, Owner, Producer};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// A pending or active tunnel.
///
/// `cts` carries frames from the client to the server, `stc` from the server
/// to the client. The server side owns `stc`; clients only participate in
/// `cts`, so a client leaving never ends the session and another client can
/// attach under the same code.
pub struct RelaySession {
    id: u64,
    code: String,
    cts: Arc<MessageChannel>,
    stc: Arc<MessageChannel>,
    // Held for the session's lifetime so cts is never closed; clients come
    // and go as participants.
    _cts_owner: Producer<Owner>,
    clients: TaskTracker,
    active: AtomicBool,
    cancel: CancellationToken,
}

impl RelaySession {
    /// Allocate a session with fresh channels of `capacity` frames each.
    ///
    /// Returns the owning producer of `stc`, which belongs to the server side.
    pub fn new(code: impl Into<String>, capacity: usize) -> (Arc<Self>, Producer<Owner>) {
        Self::with_cancel(code, capacity, CancellationToken::new())
    }

    /// Like [`RelaySession::new`], with pumps also stopped by `cancel`.
    pub fn with_cancel(
        code: impl Into<String>,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (Arc<Self>, Producer<Owner>) {
        let (cts, cts_owner) = MessageChannel::new(capacity);
        let (stc, stc_owner) = MessageChannel::new(capacity);
        let session = Arc::new(Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            code: code.into(),
            cts,
            stc,
            _cts_owner: cts_owner,
            clients: TaskTracker::new(),
            active: AtomicBool::new(true),
            cancel,
        });
        (session, stc_owner)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Client-to-server channel.
    pub fn cts(&self) -> &Arc<MessageChannel> {
        &self.cts
    }

    /// Server-to-client channel.
    pub fn stc(&self) -> &Arc<MessageChannel> {
        &self.stc
    }

    /// Task group holding the pump pairs of attached clients.
    pub fn clients(&self) -> &TaskTracker {
        &self.clients
    }

    /// Whether the server side is still connected.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Mark the session as no longer accepting clients.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Token observed by every pump bound to this session.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop every pump bound to this session.
    pub fn cancel(&self) {
        self.deactivate();
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for every attached client pump pair to finish.
    pub async fn wait_for_clients(&self) {
        self.clients.close();
        self.clients.wait().await;
    }
}

impl std::fmt::Debug for RelaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelaySession")
            .field("id", &self.id)
            .field("code", &self.code)
            .field("active", &self.is_active())
            .finish()
    }
}
