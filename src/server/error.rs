//! Server error types

use std::net::SocketAddr;

use thiserror::Error;

use crate::transport::SocketError;

/// Errors surfaced by server construction and lifecycle operations
#[derive(Error, Debug)]
pub enum ServerError {
    /// The transport could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested bind address
        addr: SocketAddr,
        /// Underlying socket error
        #[source]
        source: SocketError,
    },

    /// Configuration rejected before binding
    #[error("invalid server configuration: {0}")]
    Config(String),

    /// `serve` called while a receive loop is already running
    #[error("server is already serving")]
    AlreadyServing,

    /// Fatal receive failure that ended the loop
    #[error("receive failed: {0}")]
    Receive(#[source] SocketError),

    /// Closing the transport failed
    #[error("close failed: {0}")]
    Close(#[source] SocketError),

    /// Handler tasks still running when the drain deadline passed
    #[error("{remaining} handler task(s) still running after drain timeout")]
    DrainTimeout {
        /// Number of tasks aborted at the deadline
        remaining: usize,
    },
}
