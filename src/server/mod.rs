//! Server core: receive loop, dispatch and shutdown.
//!
//! A [`Server`] owns one [`Transport`](crate::transport::Transport), a
//! [`Decoder`] and a [`Handler`]. [`Server::serve`] receives datagrams,
//! decodes them and runs the handler for each decoded message on its own
//! task. Receive failures end the loop; decode failures only drop the
//! offending datagram.
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//! use mxp_server::{Message, MessageCodec, Server, TransportRef};
//!
//! async fn handle(_transport: TransportRef, peer: SocketAddr, message: Message) {
//!     tracing::info!(%peer, kind = %message.kind(), "message received");
//! }
//!
//! # async fn run() -> Result<(), mxp_server::ServerError> {
//! let server = Arc::new(Server::bind("0.0.0.0:6767".parse().unwrap(), MessageCodec, handle).await?);
//! let serving = tokio::spawn({
//!     let server = Arc::clone(&server);
//!     async move { server.serve().await }
//! });
//!
//! // ... later
//! server.shutdown().await?;
//! # let _ = serving.await;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod handler;
mod metrics;

use std::fmt;
use std::mem;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, timeout_at};
use tracing::{Instrument, Span, debug, debug_span, error, info, warn};

pub use config::{
    DEFAULT_BUFFER_SIZE, DEFAULT_DRAIN_TIMEOUT, MAX_BUFFER_SIZE, ServerBuilder, ServerConfig,
};
pub use error::ServerError;
pub use handler::{Decoder, Handler};
pub use metrics::MetricsSnapshot;

use crate::transport::{SocketError, TransportRef};
use metrics::ServerMetrics;

/// Connectionless datagram server.
///
/// Share it behind an [`Arc`] to call [`close`](Self::close) or
/// [`shutdown`](Self::shutdown) while [`serve`](Self::serve) runs elsewhere.
/// Dropping the server detaches handler tasks that are still running.
///
/// Handlers start in the order their messages were decoded, whatever the
/// runtime flavour; they may finish in any order.
pub struct Server<D: Decoder> {
    transport: TransportRef,
    decoder: D,
    handler: Arc<dyn Handler<D::Message>>,
    config: ServerConfig,
    span: Span,
    limiter: Option<Arc<Semaphore>>,
    tasks: Mutex<JoinSet<()>>,
    next_ticket: AtomicU64,
    turn: Arc<watch::Sender<u64>>,
    serving: watch::Sender<bool>,
    closing: AtomicBool,
    metrics: ServerMetrics,
}

impl<D: Decoder> Server<D> {
    /// Bind a UDP transport on `addr` with default configuration.
    pub async fn bind(
        addr: SocketAddr,
        decoder: D,
        handler: impl Handler<D::Message>,
    ) -> Result<Self, ServerError> {
        ServerBuilder::new(decoder, handler).bind(addr).await
    }

    /// Start a [`ServerBuilder`].
    pub fn builder(decoder: D, handler: impl Handler<D::Message>) -> ServerBuilder<D> {
        ServerBuilder::new(decoder, handler)
    }

    pub(crate) fn from_parts(
        transport: TransportRef,
        decoder: D,
        handler: Arc<dyn Handler<D::Message>>,
        config: ServerConfig,
        span: Span,
    ) -> Self {
        let limiter = config.max_in_flight.map(|n| Arc::new(Semaphore::new(n)));
        let (serving, _) = watch::channel(false);
        Self {
            transport,
            decoder,
            handler,
            config,
            span,
            limiter,
            tasks: Mutex::new(JoinSet::new()),
            next_ticket: AtomicU64::new(0),
            turn: Arc::new(watch::channel(0).0),
            serving,
            closing: AtomicBool::new(false),
            metrics: ServerMetrics::default(),
        }
    }

    /// Run the receive loop until the transport fails or is closed.
    ///
    /// Returns `Ok(())` when the loop ended because of [`close`](Self::close)
    /// or [`shutdown`](Self::shutdown), and [`ServerError::Receive`] for any
    /// other receive failure. Only one loop may run at a time.
    pub async fn serve(&self) -> Result<(), ServerError> {
        let _serving = ServingGuard::acquire(&self.serving)?;
        self.receive_loop().instrument(self.span.clone()).await
    }

    async fn receive_loop(&self) -> Result<(), ServerError> {
        match self.transport.local_addr() {
            Ok(local_addr) => info!(%local_addr, "server listening"),
            Err(err) => warn!(error = %err, "server listening on unknown address"),
        }
        let capacity = self.config.buffer_size;
        // One spare byte tells a datagram that exactly fills the buffer
        // apart from a truncated one.
        let mut scratch = vec![0u8; capacity + 1];

        loop {
            let (len, peer) = match self.transport.recv_from(&mut scratch).await {
                Ok(received) => received,
                Err(err) if self.closing.load(Ordering::Acquire) => {
                    info!(error = %err, "transport closed; receive loop stopped");
                    return Ok(());
                }
                Err(err) => {
                    error!(error = %err, "error reading from transport");
                    return Err(ServerError::Receive(err));
                }
            };
            let accepted = len.min(capacity);
            self.metrics.record_datagram(accepted);
            debug!(%peer, len, "handling datagram");

            if len > capacity {
                self.metrics.record_truncated();
                warn!(%peer, capacity, "datagram exceeds receive buffer; truncated");
                if self.config.drop_truncated {
                    continue;
                }
            }
            // Exact-size copy: a message kept alive by a handler pins only
            // its own bytes, not a whole receive buffer.
            let datagram = Bytes::copy_from_slice(&scratch[..accepted]);

            match self.decoder.decode(datagram) {
                Ok(message) => self.dispatch(peer, message),
                Err(err) => {
                    self.metrics.record_decode_error();
                    warn!(%peer, error = %err, "discarding malformed datagram");
                }
            }
        }
    }

    fn dispatch(&self, peer: SocketAddr, message: D::Message) {
        let permit = match &self.limiter {
            Some(limiter) => {
                if let Ok(permit) = Arc::clone(limiter).try_acquire_owned() {
                    Some(permit)
                } else {
                    self.metrics.record_overload();
                    warn!(%peer, "handler limit reached; message dropped");
                    return;
                }
            }
            None => None,
        };

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let turn = Arc::clone(&self.turn);
        let handler = Arc::clone(&self.handler);
        let transport = Arc::clone(&self.transport);
        let task = async move {
            let _permit = permit;
            // Freshly spawned tasks may be polled out of order; wait until
            // every earlier handler has started.
            let _ = turn.subscribe().wait_for(|next| *next == ticket).await;
            turn.send_replace(ticket + 1);
            handler.handle(transport, peer, message).await;
        }
        .instrument(debug_span!("handler", %peer));

        let mut tasks = self.tasks();
        while let Some(finished) = tasks.try_join_next() {
            self.observe(finished);
        }
        tasks.spawn(task);
        self.metrics.record_dispatch();
    }

    fn observe(&self, finished: Result<(), JoinError>) {
        if let Err(err) = finished {
            if err.is_panic() {
                self.metrics.record_handler_panic();
                error!(parent: &self.span, error = %err, "handler panicked");
            }
        }
    }

    /// Close the transport, ending a running receive loop.
    ///
    /// Handler tasks are neither awaited nor cancelled. Closing an already
    /// closed server reports the transport's double-close error.
    pub fn close(&self) -> Result<(), ServerError> {
        self.closing.store(true, Ordering::Release);
        self.transport.close().map_err(ServerError::Close)
    }

    /// Close, wait for the receive loop to stop, then drain handler tasks.
    ///
    /// Waits at most [`ServerConfig::drain_timeout`] in total. Tasks still
    /// running at the deadline are aborted and reported as
    /// [`ServerError::DrainTimeout`].
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        match self.close() {
            Ok(()) | Err(ServerError::Close(SocketError::Closed)) => {}
            Err(err) => return Err(err),
        }
        let deadline = Instant::now() + self.config.drain_timeout;

        let mut serving = self.serving.subscribe();
        let loop_stopped = timeout_at(deadline, serving.wait_for(|serving| !*serving))
            .await
            .is_ok();
        if !loop_stopped {
            warn!(parent: &self.span, "receive loop still running at drain deadline");
        }

        let mut tasks = mem::take(&mut *self.tasks());
        let pending = tasks.len();
        debug!(parent: &self.span, pending, "draining handler tasks");
        let drained = timeout_at(deadline, async {
            while let Some(finished) = tasks.join_next().await {
                self.observe(finished);
            }
        })
        .await;

        if drained.is_err() {
            let remaining = tasks.len();
            warn!(parent: &self.span, remaining, "aborting handler tasks after drain timeout");
            tasks.shutdown().await;
            return Err(ServerError::DrainTimeout { remaining });
        }
        info!(parent: &self.span, "server shut down");
        Ok(())
    }

    /// Whether a receive loop is currently running.
    #[must_use]
    pub fn is_serving(&self) -> bool {
        *self.serving.borrow()
    }

    /// Local address of the transport.
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        self.transport.local_addr()
    }

    /// The transport shared with handlers.
    #[must_use]
    pub fn transport(&self) -> &TransportRef {
        &self.transport
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Snapshot of the server's counters.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<D: Decoder> fmt::Debug for Server<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("transport", &self.transport)
            .field("config", &self.config)
            .field("serving", &self.is_serving())
            .finish_non_exhaustive()
    }
}

impl<D: Decoder> Drop for Server<D> {
    fn drop(&mut self) {
        self.tasks().detach_all();
    }
}

/// Marks a receive loop as running for as long as it lives.
struct ServingGuard<'a>(&'a watch::Sender<bool>);

impl<'a> ServingGuard<'a> {
    fn acquire(serving: &'a watch::Sender<bool>) -> Result<Self, ServerError> {
        if serving.send_if_modified(|running| !mem::replace(running, true)) {
            Ok(Self(serving))
        } else {
            Err(ServerError::AlreadyServing)
        }
    }
}

impl Drop for ServingGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}
