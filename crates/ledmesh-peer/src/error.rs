use std::net::SocketAddr;
use std::time::Duration;

/// Errors that can occur in peer operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] ledmesh_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] ledmesh_frame::FrameError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A non-JSON codec failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// No live connection exists for the address.
    #[error("closed pipe: no live connection for {0}")]
    ClosedPipe(SocketAddr),

    /// The connection's outbound queue is full.
    #[error("outbound queue full for {0}")]
    QueueFull(SocketAddr),

    /// Request timed out.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Nothing, not even a heartbeat, arrived within the idle timeout.
    #[error("peer idle for {0:?}")]
    IdleTimeout(Duration),

    /// Peer disconnected.
    #[error("peer disconnected: {0}")]
    Disconnected(String),
}

pub type Result<T> = std::result::Result<T, PeerError>;
