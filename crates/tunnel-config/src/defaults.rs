//! Default value functions for serde deserialization.
//!
//! These functions forward to constants defined in `tunnel_core::defaults`.

use tunnel_core::defaults;

/// Generate default value functions that forward to tunnel_core::defaults constants.
macro_rules! default_fns {
    // For Copy types (integers, bool, etc.)
    ($($fn_name:ident => $const_name:ident : $ty:ty),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> $ty {
                defaults::$const_name
            }
        )*
    };
}

/// Generate default value functions that return String from &str constants.
macro_rules! default_string_fns {
    ($($fn_name:ident => $const_name:ident),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> String {
                defaults::$const_name.to_string()
            }
        )*
    };
}

default_fns! {
    default_max_header_bytes      => DEFAULT_MAX_HEADER_BYTES: usize,
    min_header_bytes              => MIN_HEADER_BYTES: usize,
    default_connection_backlog    => DEFAULT_CONNECTION_BACKLOG: u32,
    default_channel_capacity      => DEFAULT_CHANNEL_CAPACITY: usize,
    default_idle_timeout_secs     => DEFAULT_IDLE_TIMEOUT_SECS: u64,
    default_teardown_grace_ms     => DEFAULT_TEARDOWN_GRACE_MS: u64,
    default_ws_max_frame_bytes    => DEFAULT_WS_MAX_FRAME_BYTES: usize,
}

default_string_fns! {
    default_listen => DEFAULT_LISTEN,
}
