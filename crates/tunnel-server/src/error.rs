//! Server error types.

use tokio_tungstenite::tungstenite;
use tunnel_core::{ERROR_CONFIG, ERROR_IO, ERROR_WEBSOCKET};

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("websocket: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("config: {0}")]
    Config(String),
}

impl ServerError {
    /// Error kind used in log fields.
    pub fn error_type(&self) -> &'static str {
        match self {
            ServerError::Io(_) => ERROR_IO,
            ServerError::WebSocket(_) => ERROR_WEBSOCKET,
            ServerError::Config(_) => ERROR_CONFIG,
        }
    }
}
