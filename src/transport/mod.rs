//! Transport bindings: the packet socket capability the server core runs on.
//!
//! [`Transport`] is the only thing the core needs from a socket. Two
//! implementations ship with the crate: [`UdpBinding`] over a tokio UDP
//! socket, and [`MemoryBinding`] over an in-process [`MemoryNetwork`].

mod error;
mod memory;
mod socket;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

pub use error::SocketError;
pub use memory::{MemoryBinding, MemoryNetwork};
pub use socket::UdpBinding;

/// A bound, connectionless packet socket.
///
/// Implementations must be safe for concurrent use: the receive loop and any
/// number of handler tasks share one binding.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Receive one datagram into `buf`, waiting until one arrives.
    ///
    /// Datagrams longer than `buf` are truncated and the returned length is
    /// `buf.len()`. Must fail with [`SocketError::Closed`] once
    /// [`close`](Transport::close) has been called, including for a receive
    /// already in progress.
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), SocketError>;

    /// Send `buf` as one datagram to `addr`.
    async fn send_to(&self, buf: &[u8], addr: SocketAddr) -> Result<usize, SocketError>;

    /// Close the binding, waking any pending receive.
    ///
    /// Closing twice returns [`SocketError::Closed`].
    fn close(&self) -> Result<(), SocketError>;

    /// Local address this binding is bound to.
    fn local_addr(&self) -> Result<SocketAddr, SocketError>;
}

/// Shared handle to a transport, as handed to handlers.
pub type TransportRef = Arc<dyn Transport>;

/// Resolves once the close flag is set, or its sender is gone.
async fn wait_closed(mut closed: watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}
