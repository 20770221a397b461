//! Decoder and handler capabilities consumed by the server core.

use std::future::Future;
use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::Bytes;

use crate::transport::TransportRef;

/// Turns one raw datagram into a protocol message.
///
/// Called on the receive loop for every datagram, so it should be cheap and
/// must not block.
pub trait Decoder: Send + Sync + 'static {
    /// Decoded message type
    type Message: Send + 'static;
    /// Decode failure
    type Error: std::error::Error + Send + Sync + 'static;

    /// Decode `datagram`. Each datagram is copied into its own exact-size
    /// allocation, so the message may keep zero-copy slices of it.
    fn decode(&self, datagram: Bytes) -> Result<Self::Message, Self::Error>;
}

/// Application logic invoked once per decoded message.
///
/// Each invocation runs on its own task. Replies go out through `transport`;
/// errors are the handler's to log.
///
/// Any `Fn(TransportRef, SocketAddr, M) -> impl Future<Output = ()>` is a
/// handler:
///
/// ```rust
/// use std::net::SocketAddr;
/// use mxp_server::{Message, TransportRef};
///
/// let handler = |transport: TransportRef, peer: SocketAddr, message: Message| async move {
///     if let Ok(reply) = message.reply(message.payload().clone()) {
///         let _ = transport.send_to(&reply.encode(), peer).await;
///     }
/// };
/// # fn assert_handler<H: mxp_server::Handler<Message>>(_: &H) {}
/// # assert_handler(&handler);
/// ```
#[async_trait]
pub trait Handler<M: Send + 'static>: Send + Sync + 'static {
    /// Handle `message` received from `peer`.
    async fn handle(&self, transport: TransportRef, peer: SocketAddr, message: M);
}

#[async_trait]
impl<M, F, Fut> Handler<M> for F
where
    M: Send + 'static,
    F: Fn(TransportRef, SocketAddr, M) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, transport: TransportRef, peer: SocketAddr, message: M) {
        (self)(transport, peer, message).await;
    }
}
