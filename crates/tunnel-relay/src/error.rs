//! Error types for the relay crate.

use thiserror::Error;

/// Enqueue attempted on a channel its owner already closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("channel closed")]
pub struct ChannelClosed;
