//! Default configuration values.
//!
//! Centralized default constants for use across all crates.

// ============================================================================
// Listener Defaults
// ============================================================================

/// Environment variable holding the listen address.
pub const LISTEN_ENV: &str = "LISTEN";
/// Default listen address (all interfaces, port 4000).
pub const DEFAULT_LISTEN: &str = "0.0.0.0:4000";
/// Default TCP listener backlog.
pub const DEFAULT_CONNECTION_BACKLOG: u32 = 1024;
/// Default graceful shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Request Defaults
// ============================================================================

/// Default maximum request head bytes read before routing.
pub const DEFAULT_MAX_HEADER_BYTES: usize = 8192;
/// Smallest accepted `max_header_bytes` setting.
pub const MIN_HEADER_BYTES: usize = 256;
/// Time allowed for a peer to send its complete request head.
pub const DEFAULT_HEADER_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Relay Defaults
// ============================================================================

/// Default per-direction channel capacity, in frames.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 8;
/// Default idle timeout in seconds (0 = disabled).
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 0;
/// Default delay before a finished session leaves the registry.
pub const DEFAULT_TEARDOWN_GRACE_MS: u64 = 1000;

// ============================================================================
// WebSocket Defaults
// ============================================================================

/// Default max WebSocket message/frame size (16 MiB).
pub const DEFAULT_WS_MAX_FRAME_BYTES: usize = 16 << 20;
