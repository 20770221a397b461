//! Server configuration and builder.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::Span;

use super::{Decoder, Handler, Server, ServerError};
use crate::transport::{Transport, TransportRef, UdpBinding};

/// Default receive buffer capacity in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Largest receive buffer that makes sense for a single UDP datagram.
pub const MAX_BUFFER_SIZE: usize = u16::MAX as usize;

/// Default upper bound for draining handler tasks on shutdown.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Server configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ServerConfig {
    /// Receive buffer capacity. Longer datagrams are truncated by the
    /// transport; truncation is detected, logged and counted.
    pub buffer_size: usize,
    /// Maximum number of concurrently running handler tasks. Messages
    /// decoded while the limit is reached are dropped. `None` is unbounded.
    pub max_in_flight: Option<usize>,
    /// Discard truncated datagrams instead of handing the truncated bytes
    /// to the decoder.
    pub drop_truncated: bool,
    /// How long [`Server::shutdown`] waits for handler tasks.
    pub drain_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_in_flight: None,
            drop_truncated: false,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Check field ranges.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.buffer_size == 0 || self.buffer_size > MAX_BUFFER_SIZE {
            return Err(ServerError::Config(format!(
                "buffer_size must be within 1..={MAX_BUFFER_SIZE}, got {}",
                self.buffer_size
            )));
        }
        if self.max_in_flight == Some(0) {
            return Err(ServerError::Config(
                "max_in_flight must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`Server`].
///
/// Options apply in call order; a later call overrides an earlier one.
pub struct ServerBuilder<D: Decoder> {
    decoder: D,
    handler: Arc<dyn Handler<D::Message>>,
    config: ServerConfig,
    transport: Option<TransportRef>,
    span: Option<Span>,
}

impl<D: Decoder> ServerBuilder<D> {
    /// Start a builder for the given decoder and handler.
    pub fn new(decoder: D, handler: impl Handler<D::Message>) -> Self {
        Self {
            decoder,
            handler: Arc::new(handler),
            config: ServerConfig::default(),
            transport: None,
            span: None,
        }
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Receive buffer capacity.
    #[must_use]
    pub fn buffer_size(mut self, bytes: usize) -> Self {
        self.config.buffer_size = bytes;
        self
    }

    /// Cap on concurrently running handler tasks.
    #[must_use]
    pub fn max_in_flight(mut self, limit: usize) -> Self {
        self.config.max_in_flight = Some(limit);
        self
    }

    /// Discard truncated datagrams.
    #[must_use]
    pub fn drop_truncated(mut self, drop: bool) -> Self {
        self.config.drop_truncated = drop;
        self
    }

    /// Upper bound for draining handler tasks on shutdown.
    #[must_use]
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.config.drain_timeout = timeout;
        self
    }

    /// Serve on an already bound transport; the bind address is then ignored.
    #[must_use]
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Parent span for every event the server logs.
    #[must_use]
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Validate, acquire the transport and build the server.
    ///
    /// Binds a [`UdpBinding`] on `addr` unless a transport was supplied.
    pub async fn bind(self, addr: SocketAddr) -> Result<Server<D>, ServerError> {
        self.config.validate()?;

        let transport: TransportRef = match self.transport {
            Some(transport) => transport,
            None => Arc::new(
                UdpBinding::bind(addr)
                    .await
                    .map_err(|source| ServerError::Bind { addr, source })?,
            ),
        };

        let span = self.span.unwrap_or_else(|| {
            let local_addr = transport.local_addr().unwrap_or(addr);
            tracing::info_span!("server", %local_addr)
        });

        Ok(Server::from_parts(
            transport,
            self.decoder,
            self.handler,
            self.config,
            span,
        ))
    }
}
