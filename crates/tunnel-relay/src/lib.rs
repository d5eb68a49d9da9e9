//! Rendezvous relay engine for quick-tunnel.
//!
//! A server endpoint registers a [`RelaySession`] under a code; clients that
//! present the same code are attached to it. Each session holds two bounded
//! [`MessageChannel`]s, one per direction, and every attached connection runs
//! a pump pair ([`run_pumps`]) that moves [`Frame`]s between its WebSocket
//! and those channels.
//!
//! # Ownership
//!
//! - `stc` (server to client) is owned by the server connection; it closes
//!   when the server disconnects, which drains and then ends the client.
//! - `cts` (client to server) only ever has participants; clients can leave
//!   and reattach without ending the session.

pub mod channel;
pub mod error;
pub mod frame;
pub mod pump;
pub mod registry;
pub mod session;

pub use channel::{Consumer, MessageChannel, Owner, Participant, Producer, Role};
pub use error::ChannelClosed;
pub use frame::{Frame, Opcode};
pub use pump::{PumpEnd, PumpOutcome, run_pumps};
pub use registry::SessionRegistry;
pub use session::RelaySession;
