//! Error type constants for logging.
//!
//! These constants provide consistent error classification across all crates.

/// I/O error.
pub const ERROR_IO: &str = "io";
/// WebSocket handshake or framing error.
pub const ERROR_WEBSOCKET: &str = "websocket";
/// Configuration error.
pub const ERROR_CONFIG: &str = "config";
