use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::kind::MessageType;

/// Length prefix: 4 bytes, big-endian.
pub const HEADER_SIZE: usize = 4;

/// Smallest legal body: type (1) + seq (4).
pub const MIN_BODY_LEN: usize = 5;

/// Largest legal body (type + seq + payload): 16 MiB.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// One decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Raw message type byte.
    pub msg_type: u8,
    /// Correlation sequence number.
    pub seq: u32,
    /// Type-specific payload.
    pub payload: Bytes,
}

impl Message {
    /// Create a new message.
    pub fn new(kind: MessageType, seq: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            msg_type: kind.as_u8(),
            seq,
            payload: payload.into(),
        }
    }

    /// Create a message with an empty payload (`ready`, `ping`, `pong`).
    pub fn empty(kind: MessageType, seq: u32) -> Self {
        Self::new(kind, seq, Bytes::new())
    }

    /// The message type, if it is one this crate knows.
    pub fn kind(&self) -> Option<MessageType> {
        MessageType::try_from(self.msg_type).ok()
    }

    /// Whether this message has the given type.
    pub fn is(&self, kind: MessageType) -> bool {
        self.msg_type == kind.as_u8()
    }

    /// The total wire size of this message (length prefix + body).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + MIN_BODY_LEN + self.payload.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌─────────────┬──────────┬────────────┬──────────────────┐
/// │ Length (4B) │ Type(1B) │ Seq (4B)   │ Payload          │
/// │ big-endian  │          │ big-endian │ (Length-5 bytes) │
/// └─────────────┴──────────┴────────────┴──────────────────┘
/// ```
pub fn encode_frame(msg_type: u8, seq: u32, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let body_len = MIN_BODY_LEN + payload.len();
    if body_len > MAX_FRAME_LEN {
        return Err(FrameError::FrameTooLarge {
            len: body_len,
            max: MAX_FRAME_LEN,
        });
    }
    dst.reserve(HEADER_SIZE + body_len);
    dst.put_u32(body_len as u32);
    dst.put_u8(msg_type);
    dst.put_u32(seq);
    dst.put_slice(payload);
    Ok(())
}

/// Encode a [`Message`] into the wire format.
pub fn encode_message(msg: &Message, dst: &mut BytesMut) -> Result<()> {
    encode_frame(msg.msg_type, msg.seq, &msg.payload, dst)
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer. A declared length
/// above `max_frame_len` or below [`MIN_BODY_LEN`] is a protocol error and
/// leaves the buffer untouched.
pub fn decode_frame(src: &mut BytesMut, max_frame_len: usize) -> Result<Option<Message>> {
    let Some(prefix) = src.first_chunk::<HEADER_SIZE>() else {
        return Ok(None);
    };
    let body_len = u32::from_be_bytes(*prefix) as usize;

    if body_len > max_frame_len {
        return Err(FrameError::FrameTooLarge {
            len: body_len,
            max: max_frame_len,
        });
    }
    if body_len < MIN_BODY_LEN {
        return Err(FrameError::FrameTooShort { len: body_len });
    }

    let total = HEADER_SIZE + body_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let msg_type = src.get_u8();
    let seq = src.get_u32();
    let payload = src.split_to(body_len - MIN_BODY_LEN).freeze();

    Ok(Some(Message {
        msg_type,
        seq,
        payload,
    }))
}
