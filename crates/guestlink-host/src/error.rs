use std::time::Duration;

/// Errors that can occur on the host side of a guest connection.
///
/// Protocol errors ([`HostError::Frame`]) and transport failures tear the
/// connection down. [`HostError::Timeout`] only affects the one request that
/// timed out.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Listening socket error.
    #[error("transport error: {0}")]
    Transport(#[from] guestlink_transport::TransportError),

    /// Malformed frame or payload, or an I/O error while framing.
    #[error("{0}")]
    Frame(#[from] guestlink_frame::FrameError),

    /// The guest misbehaved or went away before the handshake completed.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// No guest completed the handshake in time.
    #[error("timed out waiting for guest connection after {}ms", .0.as_millis())]
    HandshakeTimeout(Duration),

    /// A request was made with no live guest connection.
    #[error("not connected")]
    NotConnected,

    /// A handshake was started while a guest is already connected.
    #[error("guest already connected")]
    AlreadyConnected,

    /// The connection went away while a request was outstanding.
    #[error("connection closed")]
    ConnectionClosed,

    /// No response arrived for a request in time.
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The guest answered with an `error` message.
    #[error("guest error: {0}")]
    Guest(String),

    /// The guest reported that a file write failed.
    #[error("failed to write {path}: {reason}")]
    WriteFailed { path: String, reason: String },

    /// A command exited with a non-zero code.
    #[error("command failed with exit code {exit_code}: {output}")]
    CommandFailed { exit_code: i32, output: String },

    /// A guest path does not fit the wire format.
    #[error("path too long ({len} bytes, max {max})")]
    PathTooLong { len: usize, max: usize },

    /// File content does not fit in one frame.
    #[error("content too large ({size} bytes, max {max})")]
    ContentTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, HostError>;
