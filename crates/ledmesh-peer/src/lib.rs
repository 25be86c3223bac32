//! Connection management for ledmesh peers.
//!
//! This is the "just works" layer. A connection is symmetric: whichever side
//! dialed, both run the same read loop, both can fire events, and both can
//! issue requests that block until the matching response arrives.

pub mod codec;
pub mod connector;
pub mod endpoint;
pub mod envelope;
pub mod error;
pub mod listener;
pub mod peer;
pub mod table;

pub use codec::{EventCodec, JsonCodec};
pub use connector::{connect, run_client};
pub use endpoint::{Endpoint, Handler};
pub use envelope::{Envelope, MessageKind};
pub use error::{PeerError, Result};
pub use listener::PeerListener;
pub use peer::{PeerConfig, PeerHandle};
pub use table::Connections;
