//! Datagram message format
//!
//! A compact, checksummed framing for single-datagram messages. The server
//! core never depends on this module directly; it is wired in through
//! [`MessageCodec`], which implements [`crate::Decoder`].

mod codec;
mod error;
mod header;
mod message;
mod types;

pub use codec::{MessageCodec, decode, encode};
pub use error::{Error, Result};
pub use header::MessageHeader;
pub use message::Message;
pub use types::MessageKind;

/// Datagram magic number: "MXD1" in ASCII
pub const MAGIC_NUMBER: u32 = 0x4D58_4431;

/// Current wire format version
pub const VERSION: u8 = 1;

/// Header size in bytes
pub const HEADER_SIZE: usize = 16;

/// Checksum size in bytes
pub const CHECKSUM_SIZE: usize = 8;

/// Minimum datagram size (header + checksum)
pub const MIN_MESSAGE_SIZE: usize = HEADER_SIZE + CHECKSUM_SIZE;

/// Largest payload that still fits a single UDP datagram alongside framing.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize - MIN_MESSAGE_SIZE;
