//! Datagram header

use super::{Error, HEADER_SIZE, MAGIC_NUMBER, MessageKind, Result, VERSION};

/// Datagram header (16 bytes)
///
/// # Wire Format
///
/// ```text
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                        Magic Number (4)                       |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |    Version    |     Kind      |       Payload Length (2)      |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// +                      Message ID (8)                           +
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// All multi-byte fields are little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    kind: MessageKind,
    payload_len: u16,
    message_id: u64,
}

impl MessageHeader {
    /// Create a new header
    #[must_use]
    pub const fn new(kind: MessageKind, message_id: u64, payload_len: u16) -> Self {
        Self {
            kind,
            payload_len,
            message_id,
        }
    }

    /// Message kind
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Message ID
    #[must_use]
    pub const fn message_id(&self) -> u64 {
        self.message_id
    }

    /// Payload length in bytes
    #[must_use]
    pub const fn payload_len(&self) -> u16 {
        self.payload_len
    }

    /// Serialize to the 16-byte wire representation
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&MAGIC_NUMBER.to_le_bytes());
        bytes[4] = VERSION;
        bytes[5] = self.kind.as_u8();
        bytes[6..8].copy_from_slice(&self.payload_len.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.message_id.to_le_bytes());
        bytes
    }

    /// Parse a header from the start of `bytes`
    ///
    /// Checks magic, version and kind. Length and checksum are the codec's
    /// concern.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::BufferTooSmall {
                needed: HEADER_SIZE,
                got: bytes.len(),
            });
        }

        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic != MAGIC_NUMBER {
            return Err(Error::InvalidMagic { found: magic });
        }

        let version = bytes[4];
        if version != VERSION {
            return Err(Error::UnsupportedVersion { version });
        }

        let kind = MessageKind::from_u8(bytes[5])
            .ok_or(Error::InvalidKind { kind_byte: bytes[5] })?;
        let payload_len = u16::from_le_bytes([bytes[6], bytes[7]]);

        let mut id = [0u8; 8];
        id.copy_from_slice(&bytes[8..16]);

        Ok(Self {
            kind,
            payload_len,
            message_id: u64::from_le_bytes(id),
        })
    }
}
