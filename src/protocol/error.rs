//! Decode error types

use thiserror::Error;

/// Errors produced while decoding a datagram
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid magic number
    #[error("invalid magic number: expected 0x4D584431, got {found:#x}")]
    InvalidMagic {
        /// Found magic number
        found: u32,
    },

    /// Unsupported wire format version
    #[error("unsupported version: {version}")]
    UnsupportedVersion {
        /// Version byte carried by the datagram
        version: u8,
    },

    /// Invalid message kind
    #[error("invalid message kind: {kind_byte:#x}")]
    InvalidKind {
        /// Invalid kind byte
        kind_byte: u8,
    },

    /// Checksum mismatch
    #[error("checksum mismatch: expected {expected:#x}, got {found:#x}")]
    ChecksumMismatch {
        /// Expected checksum
        expected: u64,
        /// Found checksum
        found: u64,
    },

    /// Payload too large to frame
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Payload size
        size: usize,
        /// Maximum allowed
        max: usize,
    },

    /// Datagram shorter than its header claims
    #[error("buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall {
        /// Needed size
        needed: usize,
        /// Actual size
        got: usize,
    },

    /// Datagram longer than its header claims
    #[error("trailing bytes: expected {expected} bytes, got {got}")]
    TrailingBytes {
        /// Size implied by the header
        expected: usize,
        /// Actual size
        got: usize,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
