use bytes::BytesMut;
use tracing::trace;

use crate::codec::{decode_frame, Message, MAX_FRAME_LEN};
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Turns arbitrarily split byte chunks into complete messages.
///
/// Bytes that do not yet form a whole frame stay buffered until the next
/// [`FrameDecoder::feed`]. Consumed frames are split off the front of the
/// buffer, so total copying stays linear in the bytes received.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    max_frame_len: usize,
}

impl FrameDecoder {
    /// Create a decoder that enforces the protocol's 16 MiB frame limit.
    pub fn new() -> Self {
        Self::with_max_frame_len(MAX_FRAME_LEN)
    }

    /// Create a decoder with an explicit frame limit.
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_frame_len,
        }
    }

    /// Append `chunk` and return every message completed by it.
    ///
    /// Returns zero, one or many messages. A malformed length prefix fails
    /// the whole call; the stream is unusable after that and no message from
    /// this call is returned.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Message>> {
        self.buf.extend_from_slice(chunk);

        let mut messages = Vec::new();
        while let Some(msg) = decode_frame(&mut self.buf, self.max_frame_len)? {
            trace!(
                msg_type = msg.msg_type,
                seq = msg.seq,
                size = msg.payload.len(),
                "decoded frame"
            );
            messages.push(msg);
        }
        Ok(messages)
    }

    /// Number of bytes waiting for the rest of their frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
