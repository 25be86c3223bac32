use ledmesh_proto::{InputId, OutputId, SinkId, SourceId};

/// Errors that can occur in node operations.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("unknown input: {0}")]
    UnknownInput(InputId),

    #[error("unknown output: {0}")]
    UnknownOutput(OutputId),

    #[error("unknown source: {0}")]
    UnknownSource(SourceId),

    #[error("unknown sink: {0}")]
    UnknownSink(SinkId),

    /// A driver refused a config or failed to start or render.
    #[error("driver error: {0}")]
    Driver(String),

    #[error("peer error: {0}")]
    Peer(#[from] ledmesh_peer::PeerError),
}

impl NodeError {
    pub fn driver(message: impl ToString) -> Self {
        Self::Driver(message.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NodeError>;
