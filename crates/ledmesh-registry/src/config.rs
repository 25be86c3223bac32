use std::path::PathBuf;

use ledmesh_peer::PeerConfig;

/// Default registry listening port.
pub const DEFAULT_PORT: u16 = 2110;

/// Registry runtime settings.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// TCP port to accept node and operator connections on. `None` disables
    /// the listener.
    pub port: Option<u16>,
    /// Where the state snapshot is persisted.
    pub state_path: PathBuf,
    /// Per-connection behavior.
    pub peer: PeerConfig,
    /// Commands queued for the registry task before submitters wait.
    pub command_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            port: Some(DEFAULT_PORT),
            state_path: PathBuf::from("ledmesh-state.json"),
            peer: PeerConfig::default(),
            command_capacity: 1024,
        }
    }
}
