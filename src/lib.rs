//! # quick-tunnel
//!
//! A rendezvous WebSocket tunnel relay. A server endpoint registers a code;
//! clients connecting with the same code are relayed to it, message for
//! message, in both directions.
//!
//! ## Crates
//!
//! - [`tunnel_core`] - Shared defaults and error kinds
//! - [`tunnel_config`] - Configuration loading and validation
//! - [`tunnel_relay`] - Session registry, channels and message pumps
//! - [`tunnel_server`] - HTTP routing, WebSocket upgrade and accept loop

pub use tunnel_config as config;
pub use tunnel_core as core;
pub use tunnel_relay as relay;
pub use tunnel_server as server;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use tunnel_config::{Config, load_config, load_or_default, validate_config};
    pub use tunnel_relay::{Frame, Opcode, SessionRegistry};
    pub use tunnel_server::{CancellationToken, ServerError, run, run_with_shutdown};
}
