use ledmesh_peer::PeerConfig;
use ledmesh_transport::DialConfig;

/// How a node reaches and talks to the registry.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    /// Connect timeout and retry backoff.
    pub dial: DialConfig,
    /// Per-connection behavior.
    pub peer: PeerConfig,
    /// Dial only candidates in private address ranges.
    pub private_only: bool,
}
