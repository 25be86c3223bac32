//! Length-prefixed message framing for ledmesh.
//!
//! Every message on the wire is:
//! - A 4-byte little-endian payload length
//! - `length` bytes of codec-encoded payload
//!
//! A zero length is a heartbeat and carries no payload. Decoding is a
//! two-state machine (`AwaitingLength` / `AwaitingPayload`), so callers
//! always get complete frames.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{encode_frame, Frame, FrameCodec, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
