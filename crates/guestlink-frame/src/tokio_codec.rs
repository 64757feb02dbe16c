//! `tokio_util::codec` adapter over the frame codec.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_message, Message, MAX_FRAME_LEN};
use crate::error::FrameError;

/// Frame codec for `FramedRead` / `FramedWrite` over a guest stream.
#[derive(Debug, Clone)]
pub struct GuestCodec {
    max_frame_len: usize,
}

impl GuestCodec {
    /// Codec enforcing the protocol's 16 MiB frame limit.
    pub fn new() -> Self {
        Self::with_max_frame_len(MAX_FRAME_LEN)
    }

    /// Codec with an explicit frame limit.
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }
}

impl Default for GuestCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for GuestCodec {
    type Item = Message;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, FrameError> {
        decode_frame(src, self.max_frame_len)
    }
}

impl Encoder<Message> for GuestCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_message(&item, dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::kind::MessageType;

    #[tokio::test]
    async fn framed_roundtrip_over_duplex() {
        let (left, right) = tokio::io::duplex(64);
        let mut writer = FramedWrite::new(left, GuestCodec::new());
        let mut reader = FramedRead::new(right, GuestCodec::new());

        writer
            .send(Message::empty(MessageType::Ready, 0))
            .await
            .unwrap();
        writer
            .send(Message::new(MessageType::ExecResult, 5, vec![7u8; 300]))
            .await
            .unwrap();

        let first = reader.next().await.unwrap().unwrap();
        assert!(first.is(MessageType::Ready));

        let second = reader.next().await.unwrap().unwrap();
        assert_eq!(second.seq, 5);
        assert_eq!(second.payload.len(), 300);
    }

    #[tokio::test]
    async fn framed_read_surfaces_protocol_error() {
        let (mut left, right) = tokio::io::duplex(64);
        let mut reader = FramedRead::new(right, GuestCodec::new());

        left.write_all(&[0xFF, 0xFF, 0xFF, 0xFF]).await.unwrap();

        let err = reader.next().await.unwrap().unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { .. }));
    }

    #[tokio::test]
    async fn framed_read_ends_cleanly_on_eof() {
        let (left, right) = tokio::io::duplex(64);
        let mut reader = FramedRead::new(right, GuestCodec::new());
        drop(left);
        assert!(reader.next().await.is_none());
    }
}
