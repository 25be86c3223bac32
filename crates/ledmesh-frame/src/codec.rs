use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{FrameError, Result};

/// Frame header: little-endian payload length.
pub const HEADER_SIZE: usize = 4;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// A single unit on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Zero-length keepalive. Carries nothing and is never dispatched.
    Heartbeat,
    /// Codec-encoded message bytes.
    Payload(Bytes),
}

impl Frame {
    /// Create a payload frame.
    pub fn payload(payload: impl Into<Bytes>) -> Self {
        Self::Payload(payload.into())
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        match self {
            Self::Heartbeat => HEADER_SIZE,
            Self::Payload(payload) => HEADER_SIZE + payload.len(),
        }
    }
}

/// Encode a payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬─────────────────┐
/// │ Length       │ Payload          │
/// │ (4B LE)      │ (Length bytes)   │
/// └──────────────┴─────────────────┘
/// ```
///
/// An empty payload encodes as a heartbeat.
pub fn encode_frame(payload: &[u8], max_payload: usize, dst: &mut BytesMut) -> Result<()> {
    let max = max_payload.min(u32::MAX as usize);
    if payload.len() > max {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u32_le(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    AwaitingLength,
    AwaitingPayload(usize),
}

/// `tokio_util` codec for length-prefixed frames.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    state: DecodeState,
    config: FrameConfig,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            state: DecodeState::AwaitingLength,
            config,
        }
    }

    /// Current codec configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if self.state == DecodeState::AwaitingLength {
            if src.len() < HEADER_SIZE {
                src.reserve(HEADER_SIZE - src.len());
                return Ok(None);
            }

            let len = src.get_u32_le() as usize;
            if len == 0 {
                return Ok(Some(Frame::Heartbeat));
            }
            if len > self.config.max_payload_size {
                return Err(FrameError::PayloadTooLarge {
                    size: len,
                    max: self.config.max_payload_size,
                });
            }
            self.state = DecodeState::AwaitingPayload(len);
        }

        let DecodeState::AwaitingPayload(len) = self.state else {
            return Ok(None);
        };
        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }

        self.state = DecodeState::AwaitingLength;
        Ok(Some(Frame::Payload(src.split_to(len).freeze())))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() && self.state == DecodeState::AwaitingLength => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        match frame {
            Frame::Heartbeat => encode_frame(&[], self.config.max_payload_size, dst),
            Frame::Payload(payload) => encode_frame(&payload, self.config.max_payload_size, dst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(payload: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_frame(payload, DEFAULT_MAX_PAYLOAD, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = encoded(b"hello, ledmesh!");
        assert_eq!(buf.len(), HEADER_SIZE + 15);
        assert_eq!(&buf[..4], &15u32.to_le_bytes());

        let frame = FrameCodec::new().decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame, Frame::payload(&b"hello, ledmesh!"[..]));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_zero_length_is_heartbeat() {
        let mut buf = BytesMut::from(&[0u8, 0, 0, 0][..]);
        let frame = FrameCodec::new().decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame, Frame::Heartbeat);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x05, 0x00][..]);
        let result = FrameCodec::new().decode(&mut buf).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_decode_payload_across_reads() {
        let full = encoded(b"hello");
        let mut codec = FrameCodec::new();

        let mut buf = BytesMut::from(&full[..HEADER_SIZE + 2]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(codec.state, DecodeState::AwaitingPayload(5));

        buf.extend_from_slice(&full[HEADER_SIZE + 2..]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame, Frame::payload(&b"hello"[..]));
        assert_eq!(codec.state, DecodeState::AwaitingLength);
    }

    #[test]
    fn test_decode_payload_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(1024 * 1024 * 32);

        let result = FrameCodec::new().decode(&mut buf);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let mut codec = FrameCodec::with_config(FrameConfig {
            max_payload_size: 4,
        });
        let mut buf = BytesMut::new();
        let err = codec
            .encode(Frame::payload(&b"oversized"[..]), &mut buf)
            .unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 9, max: 4 }));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_multiple_frames_with_heartbeat_between() {
        let mut buf = encoded(b"first");
        buf.put_u32_le(0);
        buf.extend_from_slice(&encoded(b"second"));

        let mut codec = FrameCodec::new();
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Frame::payload(&b"first"[..]))
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Frame::Heartbeat));
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Frame::payload(&b"second"[..]))
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_eof_mid_frame_is_connection_closed() {
        let full = encoded(b"truncated");
        let mut buf = BytesMut::from(&full[..HEADER_SIZE + 3]);
        let mut codec = FrameCodec::new();
        assert!(matches!(
            codec.decode_eof(&mut buf),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_eof_on_boundary_is_clean() {
        let mut buf = BytesMut::new();
        assert!(FrameCodec::new().decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_frame_wire_size() {
        assert_eq!(Frame::Heartbeat.wire_size(), HEADER_SIZE);
        assert_eq!(Frame::payload(&b"test"[..]).wire_size(), HEADER_SIZE + 4);
    }
}
