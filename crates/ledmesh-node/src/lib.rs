//! Node side of ledmesh.
//!
//! A node owns local capture inputs and render outputs, announces them to
//! the registry each time it connects, starts inputs when the registry arms
//! them, and renders data frames addressed to its outputs.

pub mod config;
pub mod driver;
pub mod error;
pub mod link;
pub mod session;

use std::net::SocketAddr;

use ledmesh_peer::{run_client, Endpoint};
use ledmesh_proto::Event;
use ledmesh_transport::{private_only, Resolver};
use tokio::task::JoinHandle;

pub use config::NodeConfig;
pub use driver::{Driver, Input, InputConfig, Output, StreamTarget};
pub use error::{NodeError, Result};
pub use link::{FrameSender, RegistryLink};
pub use session::NodeSession;

/// A node connected (or reconnecting) to its registry.
pub struct RunningNode {
    pub endpoint: Endpoint<Event, NodeSession>,
    pub task: JoinHandle<()>,
}

impl RunningNode {
    pub fn session(&self) -> &NodeSession {
        self.endpoint.handler()
    }

    /// Registry address the node is currently connected to.
    pub fn registry_addr(&self) -> Option<SocketAddr> {
        self.session().link().registry_addr()
    }

    /// Close the registry connection and stop redialing.
    pub async fn shutdown(self) {
        self.endpoint.shutdown();
        let _ = self.task.await;
    }
}

/// Keep `session` connected to whichever registry `resolver` points at.
pub fn spawn<R>(session: NodeSession, resolver: R, config: NodeConfig) -> RunningNode
where
    R: Resolver + 'static,
{
    let endpoint = Endpoint::new(session).with_config(config.peer.clone());
    let task = if config.private_only {
        let filtered = move || private_only(resolver.resolve());
        tokio::spawn(run_client(endpoint.clone(), filtered, config.dial))
    } else {
        tokio::spawn(run_client(endpoint.clone(), resolver, config.dial))
    };
    RunningNode { endpoint, task }
}
