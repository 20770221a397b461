//! Datagram codec (encode/decode)

use bytes::Bytes;
use xxhash_rust::xxh3::xxh3_64;

use super::{CHECKSUM_SIZE, Error, HEADER_SIZE, MIN_MESSAGE_SIZE, Message, MessageHeader, Result};
use crate::server::Decoder;

/// Encode a message to bytes
///
/// # Format
///
/// ```text
/// [HEADER (16 bytes)] [PAYLOAD (variable)] [CHECKSUM (8 bytes)]
/// ```
#[must_use]
pub fn encode(message: &Message) -> Vec<u8> {
    let payload = message.payload();
    let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len() + CHECKSUM_SIZE);

    bytes.extend_from_slice(&message.header().to_bytes());
    bytes.extend_from_slice(payload);

    // Checksum covers header + payload
    let checksum = xxh3_64(&bytes);
    bytes.extend_from_slice(&checksum.to_le_bytes());

    bytes
}

/// Decode a message from a single datagram
///
/// The payload of the returned message is a zero-copy slice of `bytes`.
///
/// # Errors
///
/// Returns an error if:
/// - the datagram is shorter than the header claims
/// - the datagram carries bytes past the checksum
/// - magic, version or kind are invalid
/// - the checksum doesn't match
pub fn decode(bytes: Bytes) -> Result<Message> {
    let total_available = bytes.len();

    if total_available < MIN_MESSAGE_SIZE {
        return Err(Error::BufferTooSmall {
            needed: MIN_MESSAGE_SIZE,
            got: total_available,
        });
    }

    let header = MessageHeader::from_bytes(&bytes[..HEADER_SIZE])?;

    let payload_len = usize::from(header.payload_len());
    let total_size = HEADER_SIZE + payload_len + CHECKSUM_SIZE;
    if total_available < total_size {
        return Err(Error::BufferTooSmall {
            needed: total_size,
            got: total_available,
        });
    }
    if total_available > total_size {
        return Err(Error::TrailingBytes {
            expected: total_size,
            got: total_available,
        });
    }

    let checksum_offset = HEADER_SIZE + payload_len;
    let mut stored = [0u8; CHECKSUM_SIZE];
    stored.copy_from_slice(&bytes[checksum_offset..]);
    let stored_checksum = u64::from_le_bytes(stored);
    let calculated_checksum = xxh3_64(&bytes[..checksum_offset]);

    if stored_checksum != calculated_checksum {
        return Err(Error::ChecksumMismatch {
            expected: calculated_checksum,
            found: stored_checksum,
        });
    }

    let payload = bytes.slice(HEADER_SIZE..checksum_offset);
    Ok(Message::from_parts(header, payload))
}

/// [`Decoder`] for the datagram message format
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageCodec;

impl Decoder for MessageCodec {
    type Message = Message;
    type Error = Error;

    fn decode(&self, datagram: Bytes) -> Result<Message> {
        decode(datagram)
    }
}
