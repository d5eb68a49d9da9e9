//! quick-tunnel relay server.
//!
//! Accepts TCP connections, routes `/server/<code>/...` and
//! `/client/<code>/<rest>` requests, upgrades them to WebSocket and relays
//! messages between the two roles through a [`tunnel_relay::SessionRegistry`].

pub mod cli;
mod error;
mod handler;
mod resolve;
mod router;
mod server;
mod state;
mod util;
mod ws;

pub use cli::ServerArgs;
pub use error::ServerError;
pub use router::{Route, route_path};
pub use server::{DEFAULT_SHUTDOWN_TIMEOUT, run, run_with_shutdown};
pub use tokio_util::sync::CancellationToken;
