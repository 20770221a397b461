//! Datagram message

use bytes::Bytes;
use uuid::Uuid;

use super::{Error, MAX_PAYLOAD_SIZE, MessageHeader, MessageKind, Result};

/// A decoded (or to-be-encoded) datagram message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    header: MessageHeader,
    payload: Bytes,
}

impl Message {
    /// Create a new message with a random ID
    pub fn new(kind: MessageKind, payload: impl Into<Bytes>) -> Result<Self> {
        Self::with_id(kind, Self::generate_id(), payload)
    }

    /// Create a new message with an explicit ID
    pub fn with_id(kind: MessageKind, message_id: u64, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        let len = u16::try_from(payload.len())
            .ok()
            .filter(|len| usize::from(*len) <= MAX_PAYLOAD_SIZE)
            .ok_or(Error::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            })?;

        Ok(Self {
            header: MessageHeader::new(kind, message_id, len),
            payload,
        })
    }

    /// Build a reply to this message, reusing its ID
    ///
    /// Falls back to [`MessageKind::Response`] for kinds without a natural
    /// reply.
    pub fn reply(&self, payload: impl Into<Bytes>) -> Result<Self> {
        let kind = self.kind().reply_kind().unwrap_or(MessageKind::Response);
        Self::with_id(kind, self.message_id(), payload)
    }

    pub(super) const fn from_parts(header: MessageHeader, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Message kind
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        self.header.kind()
    }

    /// Message ID
    #[must_use]
    pub const fn message_id(&self) -> u64 {
        self.header.message_id()
    }

    /// Payload
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Header
    #[must_use]
    pub const fn header(&self) -> &MessageHeader {
        &self.header
    }

    fn generate_id() -> u64 {
        let (high, _) = Uuid::new_v4().as_u64_pair();
        high
    }

    /// Encode to wire bytes
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        super::encode(self)
    }

    /// Decode from wire bytes
    pub fn decode(bytes: impl Into<Bytes>) -> Result<Self> {
        super::decode(bytes.into())
    }
}
