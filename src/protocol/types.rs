//! Message kinds

use std::fmt;

/// Kind of a datagram message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    /// Request expecting a response
    Request = 0x01,
    /// Response to a request
    Response = 0x02,
    /// Fire-and-forget notification
    Event = 0x03,

    /// Liveness probe
    Ping = 0x10,
    /// Answer to a ping
    Pong = 0x11,

    /// Error report
    Error = 0xF1,
}

impl MessageKind {
    /// Convert from byte
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Request),
            0x02 => Some(Self::Response),
            0x03 => Some(Self::Event),
            0x10 => Some(Self::Ping),
            0x11 => Some(Self::Pong),
            0xF1 => Some(Self::Error),
            _ => None,
        }
    }

    /// Convert to byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// The kind a handler is expected to answer with, if any
    #[must_use]
    pub const fn reply_kind(self) -> Option<Self> {
        match self {
            Self::Request => Some(Self::Response),
            Self::Ping => Some(Self::Pong),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Request => "Request",
            Self::Response => "Response",
            Self::Event => "Event",
            Self::Ping => "Ping",
            Self::Pong => "Pong",
            Self::Error => "Error",
        };
        f.write_str(name)
    }
}
