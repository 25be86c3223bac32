//! TCP transport primitives for ledmesh.
//!
//! This is the lowest layer of ledmesh. It binds the registry's listening
//! socket, dials out from nodes with exponential backoff, and resolves the
//! candidate registry addresses a node should try.
//!
//! Everything above this layer works on plain [`tokio::net::TcpStream`]s.

pub mod backoff;
pub mod discovery;
pub mod error;
pub mod tcp;

pub use backoff::{Backoff, BackoffPolicy};
pub use discovery::{is_private, private_only, Resolver, StaticResolver};
pub use error::{Result, TransportError};
pub use tcp::{dial, dial_with_retry, DialConfig, TcpTransport};
