//! In-process datagram network for tests and simulations.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{Mutex as AsyncMutex, mpsc, watch};
use tracing::trace;

use super::{SocketError, Transport, wait_closed};

const FIRST_EPHEMERAL_PORT: u16 = 49152;

type Datagram = (Bytes, SocketAddr);

/// A set of [`MemoryBinding`]s that can address each other.
///
/// Delivery is reliable and ordered per sender; datagrams to unbound
/// addresses are dropped, as UDP would.
#[derive(Debug, Clone)]
pub struct MemoryNetwork {
    inner: Arc<NetworkInner>,
}

#[derive(Debug)]
struct NetworkInner {
    endpoints: Mutex<HashMap<SocketAddr, mpsc::UnboundedSender<Datagram>>>,
    next_port: AtomicU16,
}

impl MemoryNetwork {
    /// Create an empty network.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(NetworkInner {
                endpoints: Mutex::new(HashMap::new()),
                next_port: AtomicU16::new(FIRST_EPHEMERAL_PORT),
            }),
        }
    }

    /// Bind an endpoint. Port 0 picks a free ephemeral port.
    pub fn bind(&self, addr: SocketAddr) -> Result<MemoryBinding, SocketError> {
        let mut endpoints = self.endpoints();
        let mut local_addr = addr;
        if local_addr.port() == 0 {
            loop {
                let port = self.inner.next_port.fetch_add(1, Ordering::Relaxed);
                local_addr.set_port(port.max(FIRST_EPHEMERAL_PORT));
                if !endpoints.contains_key(&local_addr) {
                    break;
                }
            }
        } else if endpoints.contains_key(&local_addr) {
            return Err(SocketError::Io(io::Error::new(
                io::ErrorKind::AddrInUse,
                format!("{local_addr} already bound"),
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        endpoints.insert(local_addr, tx);
        let (closed, _) = watch::channel(false);

        Ok(MemoryBinding {
            network: self.clone(),
            local_addr,
            inbox: AsyncMutex::new(rx),
            closed,
        })
    }

    fn endpoints(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<SocketAddr, mpsc::UnboundedSender<Datagram>>> {
        self.inner
            .endpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, to: SocketAddr, datagram: Datagram) {
        if let Some(inbox) = self.endpoints().get(&to) {
            let _ = inbox.send(datagram);
        } else {
            trace!(%to, "no memory endpoint; datagram dropped");
        }
    }

    fn unbind(&self, addr: SocketAddr) {
        self.endpoints().remove(&addr);
    }
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// One endpoint on a [`MemoryNetwork`].
#[derive(Debug)]
pub struct MemoryBinding {
    network: MemoryNetwork,
    local_addr: SocketAddr,
    inbox: AsyncMutex<mpsc::UnboundedReceiver<Datagram>>,
    closed: watch::Sender<bool>,
}

impl MemoryBinding {
    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

#[async_trait]
impl Transport for MemoryBinding {
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), SocketError> {
        if self.is_closed() {
            return Err(SocketError::Closed);
        }
        let mut inbox = tokio::select! {
            () = wait_closed(self.closed.subscribe()) => return Err(SocketError::Closed),
            inbox = self.inbox.lock() => inbox,
        };
        tokio::select! {
            () = wait_closed(self.closed.subscribe()) => Err(SocketError::Closed),
            datagram = inbox.recv() => {
                let (bytes, from) = datagram.ok_or(SocketError::Closed)?;
                let len = bytes.len().min(buf.len());
                buf[..len].copy_from_slice(&bytes[..len]);
                Ok((len, from))
            }
        }
    }

    async fn send_to(&self, buf: &[u8], addr: SocketAddr) -> Result<usize, SocketError> {
        if self.is_closed() {
            return Err(SocketError::Closed);
        }
        self.network
            .deliver(addr, (Bytes::copy_from_slice(buf), self.local_addr));
        Ok(buf.len())
    }

    fn close(&self) -> Result<(), SocketError> {
        let newly_closed = self.closed.send_if_modified(|closed| !std::mem::replace(closed, true));
        if !newly_closed {
            return Err(SocketError::Closed);
        }
        self.network.unbind(self.local_addr);
        Ok(())
    }

    fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        Ok(self.local_addr)
    }
}

impl Drop for MemoryBinding {
    fn drop(&mut self) {
        if !self.is_closed() {
            self.network.unbind(self.local_addr);
        }
    }
}
