//! Message type table.
//!
//! `G→H` types are only ever sent by the guest, `H→G` types only by the host.

/// Known message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// G→H, empty. Sent once by the guest right after it connects.
    Ready = 0x00,
    /// H→G, empty. Liveness probe sent in reply to `Ready`.
    Ping = 0x01,
    /// G→H, empty. Echoes the sequence number of the `Ping`.
    Pong = 0x02,
    /// H→G. Run a shell command.
    Exec = 0x03,
    /// G→H. Exit code and captured output of an `Exec`.
    ExecResult = 0x04,
    /// H→G. Write a file inside the guest.
    WriteFile = 0x05,
    /// G→H. Outcome of a `WriteFile`.
    WriteFileResult = 0x06,
    /// G→H. The guest could not handle a request.
    Error = 0xFF,
}

impl MessageType {
    /// Wire value of this type.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Exec => "exec",
            Self::ExecResult => "exec_result",
            Self::WriteFile => "write_file",
            Self::WriteFileResult => "write_file_result",
            Self::Error => "error",
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(raw: u8) -> std::result::Result<Self, u8> {
        match raw {
            0x00 => Ok(Self::Ready),
            0x01 => Ok(Self::Ping),
            0x02 => Ok(Self::Pong),
            0x03 => Ok(Self::Exec),
            0x04 => Ok(Self::ExecResult),
            0x05 => Ok(Self::WriteFile),
            0x06 => Ok(Self::WriteFileResult),
            0xFF => Ok(Self::Error),
            other => Err(other),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(kind: MessageType) -> Self {
        kind.as_u8()
    }
}

/// Returns a human-readable name for a raw message type.
pub fn type_name(raw: u8) -> &'static str {
    MessageType::try_from(raw)
        .map(MessageType::name)
        .unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_match_protocol_table() {
        assert_eq!(MessageType::Ready.as_u8(), 0x00);
        assert_eq!(MessageType::Ping.as_u8(), 0x01);
        assert_eq!(MessageType::Pong.as_u8(), 0x02);
        assert_eq!(MessageType::Exec.as_u8(), 0x03);
        assert_eq!(MessageType::ExecResult.as_u8(), 0x04);
        assert_eq!(MessageType::WriteFile.as_u8(), 0x05);
        assert_eq!(MessageType::WriteFileResult.as_u8(), 0x06);
        assert_eq!(MessageType::Error.as_u8(), 0xFF);
    }

    #[test]
    fn every_known_type_converts_back() {
        for raw in 0u8..=255 {
            if let Ok(kind) = MessageType::try_from(raw) {
                assert_eq!(u8::from(kind), raw);
            }
        }
    }

    #[test]
    fn unknown_types_are_named_unknown() {
        assert_eq!(type_name(0x07), "unknown");
        assert_eq!(type_name(0xFE), "unknown");
        assert_eq!(type_name(0x04), "exec_result");
    }
}
