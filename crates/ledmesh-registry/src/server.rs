use std::net::SocketAddr;

use ledmesh_peer::{Connections, Endpoint, Handler, PeerHandle, PeerListener};
use ledmesh_proto::{Blob, Event, NodeId, SinkId, SourceId};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::actor::{self, RegistryHandle};
use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::registry::Registry;
use crate::store::StateHolder;

/// Connection handler for the registry endpoint.
///
/// Node events go through the registry task in arrival order. Requests
/// carry operator commands and are answered with `Ack`, `ProfileCreated`
/// or `Snapshot`.
#[derive(Debug, Clone)]
pub struct RegistryServer {
    handle: RegistryHandle,
    connections: Connections<Event>,
}

/// A started registry: the endpoint to serve connections with and the task
/// owning the state.
pub struct RunningRegistry {
    pub endpoint: Endpoint<Event, RegistryServer>,
    pub task: JoinHandle<()>,
}

impl RunningRegistry {
    pub fn server(&self) -> &RegistryServer {
        self.endpoint.handler()
    }

    /// Bind the configured port and accept until the endpoint shuts down.
    pub async fn listen(&self, config: &RegistryConfig) -> Result<PeerListener<Event, RegistryServer>> {
        Ok(PeerListener::bind(config.port, self.endpoint.clone()).await?)
    }
}

impl RegistryServer {
    /// Load persisted state and spawn the registry task.
    pub fn start<S: StateHolder>(store: S, config: &RegistryConfig) -> Result<RunningRegistry> {
        let state = store.get_state()?.unwrap_or_default();
        debug!(
            nodes = state.nodes.len(),
            profiles = state.profiles.len(),
            active = state.active_profiles.len(),
            "registry state loaded"
        );

        let connections = Connections::default();
        let registry = Registry::new(state, connections.clone());
        let (handle, task) = actor::spawn(registry, store, config.command_capacity);
        let server = Self {
            handle,
            connections: connections.clone(),
        };
        let endpoint = Endpoint::new(server)
            .with_config(config.peer.clone())
            .with_connections(connections);
        Ok(RunningRegistry { endpoint, task })
    }

    pub fn handle(&self) -> &RegistryHandle {
        &self.handle
    }

    /// Ask `node` to apply a new source config and record it once accepted.
    pub async fn set_source_config(&self, node: NodeId, source_id: SourceId, config: Blob) -> Result<()> {
        let request = Event::SetSourceConfig {
            source_id: source_id.clone(),
            config: config.clone(),
        };
        self.request_config(&node, request).await?;
        self.handle
            .store_source_config(node, source_id, config)
            .await
    }

    /// Ask `node` to apply a new sink config and record it once accepted.
    pub async fn set_sink_config(&self, node: NodeId, sink_id: SinkId, config: Blob) -> Result<()> {
        let request = Event::SetSinkConfig {
            sink_id: sink_id.clone(),
            config: config.clone(),
        };
        self.request_config(&node, request).await?;
        self.handle.store_sink_config(node, sink_id, config).await
    }

    async fn request_config(&self, node: &NodeId, request: Event) -> Result<()> {
        let addr = self
            .handle
            .session_of(node.clone())
            .await?
            .ok_or(RegistryError::NodeDisconnected)?;
        match self.connections.request(addr, request).await? {
            Event::Ack { error: None } => Ok(()),
            Event::Ack { error: Some(reason) } => Err(RegistryError::Rejected(reason)),
            other => Err(RegistryError::Rejected(format!(
                "unexpected reply {}",
                other.name()
            ))),
        }
    }

    async fn answer(&self, addr: SocketAddr, event: Event) -> Event {
        match event {
            Event::CreateProfile { name, io } => match self.handle.create_profile(name, io).await {
                Ok(profile) => Event::ProfileCreated { profile },
                Err(err) => Event::nack(err),
            },
            Event::EnableProfile { id } => ack(self.handle.enable_profile(id).await),
            Event::DisableProfile { id } => ack(self.handle.disable_profile(id).await),
            Event::DeleteProfile { id } => ack(self.handle.delete_profile(id).await),
            Event::GetState => match self.handle.snapshot().await {
                Ok(state) => Event::Snapshot { state },
                Err(err) => Event::nack(err),
            },
            other => ack(self.handle.process_event(addr, other).await),
        }
    }
}

fn ack(result: Result<()>) -> Event {
    match result {
        Ok(()) => Event::ack(),
        Err(err) => Event::nack(err),
    }
}

impl Handler<Event> for RegistryServer {
    async fn connected(&self, peer: PeerHandle<Event>) {
        debug!(addr = %peer.addr(), "connection opened");
    }

    async fn disconnected(&self, addr: SocketAddr) {
        match self.handle.disconnect(addr).await {
            Ok(()) => {}
            // Operator connections never bind a node.
            Err(RegistryError::AlreadyDisconnected) => debug!(addr = %addr, "connection closed"),
            Err(err) => warn!(addr = %addr, error = %err, "disconnect failed"),
        }
    }

    async fn event(&self, addr: SocketAddr, event: Event) {
        let name = event.name();
        let is_data = matches!(event, Event::Data { .. });
        if let Err(err) = self.handle.process_event(addr, event).await {
            if is_data {
                debug!(addr = %addr, error = %err, "data frame rejected");
            } else {
                warn!(addr = %addr, event = name, error = %err, "event rejected");
            }
        }
    }

    async fn request(&self, addr: SocketAddr, event: Event) -> Event {
        let name = event.name();
        let reply = self.answer(addr, event).await;
        if let Event::Ack { error: Some(reason) } = &reply {
            debug!(addr = %addr, request = name, error = %reason, "request failed");
        }
        reply
    }
}
