//! Socket-level error type.

use std::io;

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    /// Underlying I/O error
    #[error("socket I/O error: {0}")]
    Io(#[from] io::Error),
    /// The binding has been closed
    #[error("use of closed transport")]
    Closed,
}

impl SocketError {
    /// Whether this error reports a closed binding.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
