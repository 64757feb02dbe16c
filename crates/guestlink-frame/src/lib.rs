//! Binary wire protocol spoken between the host and a guest agent.
//!
//! Every message is framed as:
//! - A 4-byte big-endian length covering everything after it
//! - A 1-byte message type
//! - A 4-byte big-endian sequence number used for request/response matching
//! - A type-specific payload
//!
//! [`FrameDecoder`] turns arbitrarily split byte chunks back into messages;
//! the [`payload`] module encodes and decodes the typed payloads.

pub mod codec;
pub mod decoder;
pub mod error;
pub mod kind;
pub mod payload;

#[cfg(feature = "async")]
pub mod tokio_codec;

pub use codec::{
    decode_frame, encode_frame, encode_message, Message, HEADER_SIZE, MAX_FRAME_LEN, MIN_BODY_LEN,
};
pub use decoder::FrameDecoder;
pub use error::{FrameError, Result};
pub use kind::{type_name, MessageType};
pub use payload::{
    ExecRequest, ExecResult, WriteFileRequest, WriteFileResult, MAX_PATH_LEN, MAX_WRITE_CONTENT,
    SUDO_FLAG,
};

#[cfg(feature = "async")]
pub use tokio_codec::GuestCodec;
