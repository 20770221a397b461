//! mxp-server - connectionless datagram server shell
//!
//! Owns a packet socket, receives datagrams, decodes each one and hands the
//! decoded message to application logic running on its own task, so a slow
//! handler never holds up reception.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//! use mxp_server::{Message, MessageCodec, Server, TransportRef};
//!
//! async fn echo(transport: TransportRef, peer: SocketAddr, message: Message) {
//!     if let Ok(reply) = message.reply(message.payload().clone()) {
//!         let _ = transport.send_to(&reply.encode(), peer).await;
//!     }
//! }
//!
//! # async fn run() -> Result<(), mxp_server::ServerError> {
//! let server = Server::builder(MessageCodec, echo)
//!     .buffer_size(1500)
//!     .max_in_flight(1024)
//!     .bind("0.0.0.0:6767".parse().unwrap())
//!     .await?;
//!
//! // Runs until the transport is closed.
//! server.serve().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Pieces
//!
//! - [`Transport`] - the socket capability; [`UdpBinding`] and
//!   [`MemoryBinding`] implement it
//! - [`Decoder`] - raw bytes to message; [`MessageCodec`] decodes the bundled
//!   [`protocol`] format
//! - [`Handler`] - per-message application logic, any matching async closure
//! - [`Server`] - receive loop, dispatch, close and graceful shutdown

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod protocol;
pub mod server;
pub mod transport;

pub use protocol::{Message, MessageCodec, MessageKind};
pub use server::{
    Decoder, Handler, MetricsSnapshot, Server, ServerBuilder, ServerConfig, ServerError,
};
pub use transport::{
    MemoryBinding, MemoryNetwork, SocketError, Transport, TransportRef, UdpBinding,
};

/// Default port used by the demos
pub const DEFAULT_PORT: u16 = 6767;
