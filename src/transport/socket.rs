//! UDP socket binding on tokio.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, instrument};

use super::{SocketError, Transport, wait_closed};

/// Binding for a UDP socket.
///
/// [`close`](Transport::close) releases the socket as soon as in-flight
/// operations return, and wakes a pending receive with
/// [`SocketError::Closed`].
#[derive(Debug)]
pub struct UdpBinding {
    socket: Mutex<Option<Arc<UdpSocket>>>,
    closed: watch::Sender<bool>,
    local_addr: SocketAddr,
}

impl UdpBinding {
    /// Bind to the provided address.
    #[instrument(level = "debug")]
    pub async fn bind(addr: SocketAddr) -> Result<Self, SocketError> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        debug!(%local_addr, "udp socket bound");
        Ok(Self::from_socket(socket, local_addr))
    }

    /// Wrap an already bound tokio socket.
    pub fn from_tokio(socket: UdpSocket) -> Result<Self, SocketError> {
        let local_addr = socket.local_addr()?;
        Ok(Self::from_socket(socket, local_addr))
    }

    fn from_socket(socket: UdpSocket, local_addr: SocketAddr) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            socket: Mutex::new(Some(Arc::new(socket))),
            closed,
            local_addr,
        }
    }

    /// Enable or disable sending to broadcast addresses.
    pub fn set_broadcast(&self, on: bool) -> Result<(), SocketError> {
        self.socket()?.set_broadcast(on)?;
        Ok(())
    }

    fn socket(&self) -> Result<Arc<UdpSocket>, SocketError> {
        self.socket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(SocketError::Closed)
    }
}

#[async_trait]
impl Transport for UdpBinding {
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), SocketError> {
        let socket = self.socket()?;
        tokio::select! {
            () = wait_closed(self.closed.subscribe()) => Err(SocketError::Closed),
            received = socket.recv_from(buf) => Ok(received?),
        }
    }

    async fn send_to(&self, buf: &[u8], addr: SocketAddr) -> Result<usize, SocketError> {
        let socket = self.socket()?;
        Ok(socket.send_to(buf, addr).await?)
    }

    fn close(&self) -> Result<(), SocketError> {
        let socket = self
            .socket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match socket {
            Some(_) => {
                self.closed.send_replace(true);
                debug!(local_addr = %self.local_addr, "udp socket closed");
                Ok(())
            }
            None => Err(SocketError::Closed),
        }
    }

    fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        Ok(self.local_addr)
    }
}
