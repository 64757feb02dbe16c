/// Errors that can occur during frame encoding/decoding.
///
/// A decode error means the byte stream can no longer be trusted; the
/// connection carrying it must be torn down rather than resynchronized.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The declared or encoded frame length exceeds the protocol maximum.
    #[error("frame too large ({len} bytes, max {max})")]
    FrameTooLarge { len: usize, max: usize },

    /// The declared frame length cannot hold a type byte and a sequence number.
    #[error("frame too small ({len} bytes, min 5)")]
    FrameTooShort { len: usize },

    /// A path does not fit the 2-byte length field.
    #[error("path too long ({len} bytes, max {max})")]
    PathTooLong { len: usize, max: usize },

    /// A payload is structurally invalid for its message type.
    #[error("{0}")]
    InvalidPayload(&'static str),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
