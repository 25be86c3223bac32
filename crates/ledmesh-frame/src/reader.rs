use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

use crate::codec::{Frame, FrameCodec, FrameConfig};
use crate::error::{FrameError, Result};

/// Reads complete frames from any `AsyncRead` stream.
///
/// Partial reads are buffered; callers always get complete frames.
pub struct FrameReader<T> {
    inner: FramedRead<T, FrameCodec>,
}

impl<T: AsyncRead + Unpin> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner: FramedRead::new(inner, FrameCodec::with_config(config)),
        }
    }

    /// Read the next frame, heartbeats included.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        match self.inner.next().await {
            Some(result) => result,
            None => Err(FrameError::ConnectionClosed),
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        self.inner.get_ref()
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        self.inner.decoder().config()
    }
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, BytesMut};
    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::codec::{encode_frame, DEFAULT_MAX_PAYLOAD};

    fn wire(payloads: &[&[u8]]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for payload in payloads {
            encode_frame(payload, DEFAULT_MAX_PAYLOAD, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[tokio::test]
    async fn read_multiple_frames() {
        let bytes = wire(&[b"one", b"", b"three"]);
        let mut reader = FrameReader::new(&bytes[..]);

        assert_eq!(
            reader.read_frame().await.unwrap(),
            Frame::payload(&b"one"[..])
        );
        assert_eq!(reader.read_frame().await.unwrap(), Frame::Heartbeat);
        assert_eq!(
            reader.read_frame().await.unwrap(),
            Frame::payload(&b"three"[..])
        );
        assert!(matches!(
            reader.read_frame().await,
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn partial_writes_are_reassembled() {
        let (mut tx, rx) = tokio::io::duplex(64);
        let bytes = wire(&[b"slow-frame"]);

        let writer = tokio::spawn(async move {
            for byte in bytes {
                tx.write_all(&[byte]).await.unwrap();
                tokio::task::yield_now().await;
            }
        });

        let mut reader = FrameReader::new(rx);
        let frame = reader.read_frame().await.unwrap();
        assert_eq!(frame, Frame::payload(&b"slow-frame"[..]));
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn connection_closed_mid_frame() {
        let mut partial = BytesMut::new();
        partial.put_u32_le(16);
        partial.put_slice(b"only-part");

        let mut reader = FrameReader::new(&partial[..]);
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[tokio::test]
    async fn oversized_frame_in_stream() {
        let mut bytes = BytesMut::new();
        bytes.put_u32_le(1024);

        let cfg = FrameConfig {
            max_payload_size: 16,
        };
        let mut reader = FrameReader::with_config(&bytes[..], cfg);
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert_eq!(reader.config().max_payload_size, 16);
    }
}
