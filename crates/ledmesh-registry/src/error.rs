use ledmesh_proto::{InputId, NodeId, OutputId, ProfileId, SinkId, SourceId};

/// Errors that can occur in registry operations.
///
/// Session and validation errors reject a single event and leave State
/// untouched; they are reported to whoever submitted the event.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The session address already has a node bound to it.
    #[error("node already connected")]
    AlreadyConnected,

    /// The session address has no node bound to it.
    #[error("node already disconnected")]
    AlreadyDisconnected,

    /// The sender has not announced itself with `NodeConnected`.
    #[error("node disconnected")]
    NodeDisconnected,

    /// A profile must route at least one input.
    #[error("profile has no IO")]
    EmptyIo,

    #[error("profile not found: {0}")]
    ProfileNotFound(ProfileId),

    #[error("profile already enabled: {0}")]
    ProfileAlreadyEnabled(ProfileId),

    #[error("profile not enabled: {0}")]
    ProfileNotEnabled(ProfileId),

    /// Active profiles cannot be deleted.
    #[error("profile is active: {0}")]
    ProfileActive(ProfileId),

    /// Another active profile already drives this output.
    #[error("output already in use: {0}")]
    OutputInUse(OutputId),

    #[error("unknown sink node: {0}")]
    UnknownSinkNode(NodeId),

    #[error("sink node disconnected: {0}")]
    SinkNodeDisconnected(NodeId),

    /// None of the data frame's outputs is routed from the sender.
    #[error("invalid output")]
    InvalidOutput,

    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("unknown input: {0}")]
    UnknownInput(InputId),

    #[error("unknown output: {0}")]
    UnknownOutput(OutputId),

    #[error("unknown source {source_id} on node {node}")]
    UnknownSource { node: NodeId, source_id: SourceId },

    #[error("unknown sink {sink_id} on node {node}")]
    UnknownSink { node: NodeId, sink_id: SinkId },

    /// The event is not something a node may send.
    #[error("unexpected event: {0}")]
    UnexpectedEvent(&'static str),

    /// A node answered a config request with an error.
    #[error("rejected by node: {0}")]
    Rejected(String),

    #[error("peer error: {0}")]
    Peer(#[from] ledmesh_peer::PeerError),

    #[error("protocol error: {0}")]
    Proto(#[from] ledmesh_proto::ProtoError),

    #[error("state store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The registry task is gone.
    #[error("registry stopped")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, RegistryError>;
