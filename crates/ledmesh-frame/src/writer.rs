use bytes::Bytes;
use futures_util::SinkExt;
use tokio::io::AsyncWrite;
use tokio_util::codec::FramedWrite;

use crate::codec::{Frame, FrameCodec, FrameConfig};
use crate::error::Result;

/// Writes complete frames to any `AsyncWrite` stream.
///
/// Every call flushes, so a returned `Ok` means the frame reached the socket.
pub struct FrameWriter<T> {
    inner: FramedWrite<T, FrameCodec>,
}

impl<T: AsyncWrite + Unpin> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner: FramedWrite::new(inner, FrameCodec::with_config(config)),
        }
    }

    /// Write a complete frame.
    pub async fn write_frame(&mut self, frame: Frame) -> Result<()> {
        self.inner.send(frame).await
    }

    /// Encode and send a payload.
    pub async fn send(&mut self, payload: impl Into<Bytes>) -> Result<()> {
        self.write_frame(Frame::Payload(payload.into())).await
    }

    /// Send a zero-length heartbeat frame.
    pub async fn heartbeat(&mut self) -> Result<()> {
        self.write_frame(Frame::Heartbeat).await
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        self.inner.get_ref()
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        self.inner.encoder().config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FrameError;
    use crate::reader::FrameReader;

    #[tokio::test]
    async fn write_then_read_over_duplex() {
        let (left, right) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        writer.send(&b"ping"[..]).await.unwrap();
        writer.heartbeat().await.unwrap();
        writer.send(vec![1u8, 2, 3]).await.unwrap();

        assert_eq!(
            reader.read_frame().await.unwrap(),
            Frame::payload(&b"ping"[..])
        );
        assert_eq!(reader.read_frame().await.unwrap(), Frame::Heartbeat);
        assert_eq!(
            reader.read_frame().await.unwrap(),
            Frame::payload(vec![1u8, 2, 3])
        );
    }

    #[tokio::test]
    async fn heartbeat_is_four_zero_bytes() {
        let mut writer = FrameWriter::new(Vec::<u8>::new());
        writer.heartbeat().await.unwrap();
        assert_eq!(writer.into_inner(), vec![0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn payload_too_large_rejected() {
        let cfg = FrameConfig {
            max_payload_size: 4,
        };
        let mut writer = FrameWriter::with_config(Vec::<u8>::new(), cfg);

        let err = writer.send(&b"oversized"[..]).await.unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert!(writer.get_ref().is_empty());
    }

    #[tokio::test]
    async fn write_fails_after_peer_drops() {
        let (left, right) = tokio::io::duplex(64);
        drop(right);
        let mut writer = FrameWriter::new(left);
        let err = writer.send(&b"lost"[..]).await.unwrap_err();
        assert!(matches!(err, FrameError::Io(_)));
    }
}
