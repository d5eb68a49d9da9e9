//! Relayed frame type.

use bytes::Bytes;
use tokio_tungstenite::tungstenite::Message;

/// WebSocket data opcode carried with each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Text,
    Binary,
}

/// One opcode-tagged message, relayed unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    opcode: Opcode,
    payload: Bytes,
}

impl Frame {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            opcode: Opcode::Text,
            payload: Bytes::from(text.into()),
        }
    }

    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self {
            opcode: Opcode::Binary,
            payload: payload.into(),
        }
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Convert a data message into a frame. Control messages yield `None`.
    pub fn from_message(msg: Message) -> Option<Self> {
        match msg {
            Message::Text(text) => Some(Self::text(text)),
            Message::Binary(data) => Some(Self::binary(data)),
            Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => None,
        }
    }

    pub fn into_message(self) -> Message {
        match self.opcode {
            Opcode::Binary => Message::Binary(self.payload.into()),
            // Text payloads are only ever built from a String.
            Opcode::Text => match String::from_utf8(self.payload.into()) {
                Ok(text) => Message::Text(text),
                Err(err) => Message::Binary(err.into_bytes()),
            },
        }
    }
}
