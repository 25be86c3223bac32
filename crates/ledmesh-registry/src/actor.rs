//! Single task that owns the [`Registry`].
//!
//! Every mutation is a [`Command`] on one queue, so state changes are
//! linearized no matter how many connections submit them. After each
//! command that changed state the snapshot is written through the
//! [`StateHolder`].

use std::net::SocketAddr;

use ledmesh_proto::{Blob, Event, IoConfig, NodeId, Profile, ProfileId, SinkId, SourceId, State};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::{RegistryError, Result};
use crate::registry::{Outbound, Outcome, Registry};
use crate::store::StateHolder;

enum Command {
    Event {
        addr: SocketAddr,
        event: Event,
        reply: oneshot::Sender<Result<()>>,
    },
    Disconnect {
        addr: SocketAddr,
        reply: oneshot::Sender<Result<()>>,
    },
    CreateProfile {
        name: String,
        io: Vec<IoConfig>,
        reply: oneshot::Sender<Result<Profile>>,
    },
    EnableProfile {
        id: ProfileId,
        reply: oneshot::Sender<Result<()>>,
    },
    DisableProfile {
        id: ProfileId,
        reply: oneshot::Sender<Result<()>>,
    },
    DeleteProfile {
        id: ProfileId,
        reply: oneshot::Sender<Result<()>>,
    },
    StoreSourceConfig {
        node: NodeId,
        source_id: SourceId,
        config: Blob,
        reply: oneshot::Sender<Result<()>>,
    },
    StoreSinkConfig {
        node: NodeId,
        sink_id: SinkId,
        config: Blob,
        reply: oneshot::Sender<Result<()>>,
    },
    SessionOf {
        node: NodeId,
        reply: oneshot::Sender<Option<SocketAddr>>,
    },
    Snapshot {
        reply: oneshot::Sender<State>,
    },
}

/// Cloneable submitter for registry commands.
#[derive(Clone)]
pub struct RegistryHandle {
    tx: mpsc::Sender<Command>,
}

impl std::fmt::Debug for RegistryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Spawn the registry task. It runs until every handle is dropped.
pub fn spawn<O, S>(registry: Registry<O>, store: S, capacity: usize) -> (RegistryHandle, JoinHandle<()>)
where
    O: Outbound,
    S: StateHolder,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let task = tokio::spawn(run(registry, store, rx));
    (RegistryHandle { tx }, task)
}

impl RegistryHandle {
    /// Apply an event received from the connection at `addr`.
    pub async fn process_event(&self, addr: SocketAddr, event: Event) -> Result<()> {
        self.call(|reply| Command::Event { addr, event, reply })
            .await?
    }

    /// The connection at `addr` closed.
    pub async fn disconnect(&self, addr: SocketAddr) -> Result<()> {
        self.call(|reply| Command::Disconnect { addr, reply }).await?
    }

    pub async fn create_profile(&self, name: String, io: Vec<IoConfig>) -> Result<Profile> {
        self.call(|reply| Command::CreateProfile { name, io, reply })
            .await?
    }

    pub async fn enable_profile(&self, id: ProfileId) -> Result<()> {
        self.call(|reply| Command::EnableProfile { id, reply }).await?
    }

    pub async fn disable_profile(&self, id: ProfileId) -> Result<()> {
        self.call(|reply| Command::DisableProfile { id, reply }).await?
    }

    pub async fn delete_profile(&self, id: ProfileId) -> Result<()> {
        self.call(|reply| Command::DeleteProfile { id, reply }).await?
    }

    pub async fn store_source_config(
        &self,
        node: NodeId,
        source_id: SourceId,
        config: Blob,
    ) -> Result<()> {
        self.call(|reply| Command::StoreSourceConfig {
            node,
            source_id,
            config,
            reply,
        })
        .await?
    }

    pub async fn store_sink_config(&self, node: NodeId, sink_id: SinkId, config: Blob) -> Result<()> {
        self.call(|reply| Command::StoreSinkConfig {
            node,
            sink_id,
            config,
            reply,
        })
        .await?
    }

    /// Live session address of `node`, if connected.
    pub async fn session_of(&self, node: NodeId) -> Result<Option<SocketAddr>> {
        self.call(|reply| Command::SessionOf { node, reply }).await
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> Result<State> {
        self.call(|reply| Command::Snapshot { reply }).await
    }

    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| RegistryError::Stopped)?;
        rx.await.map_err(|_| RegistryError::Stopped)
    }
}

async fn run<O, S>(mut registry: Registry<O>, store: S, mut rx: mpsc::Receiver<Command>)
where
    O: Outbound,
    S: StateHolder,
{
    debug!("registry task started");
    while let Some(command) = rx.recv().await {
        match command {
            Command::Event { addr, event, reply } => {
                let result = registry.process_event(addr, event);
                if matches!(result, Ok(Outcome::Mutated)) {
                    persist(&store, registry.state());
                }
                let _ = reply.send(result.map(|_| ()));
            }
            Command::Disconnect { addr, reply } => {
                let result = registry.handle_disconnect(addr);
                finish(&store, &registry, result, reply);
            }
            Command::CreateProfile { name, io, reply } => {
                let result = registry.create_profile(name, io);
                finish(&store, &registry, result, reply);
            }
            Command::EnableProfile { id, reply } => {
                let result = registry.enable_profile(&id);
                finish(&store, &registry, result, reply);
            }
            Command::DisableProfile { id, reply } => {
                let result = registry.disable_profile(&id);
                finish(&store, &registry, result, reply);
            }
            Command::DeleteProfile { id, reply } => {
                let result = registry.delete_profile(&id);
                finish(&store, &registry, result, reply);
            }
            Command::StoreSourceConfig {
                node,
                source_id,
                config,
                reply,
            } => {
                let result = registry.store_source_config(&node, &source_id, config);
                finish(&store, &registry, result, reply);
            }
            Command::StoreSinkConfig {
                node,
                sink_id,
                config,
                reply,
            } => {
                let result = registry.store_sink_config(&node, &sink_id, config);
                finish(&store, &registry, result, reply);
            }
            Command::SessionOf { node, reply } => {
                let _ = reply.send(registry.session_of(&node));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(registry.state().clone());
            }
        }
    }
    debug!("registry task stopped");
}

/// Persist on success, then hand the result back.
fn finish<O, S, T>(store: &S, registry: &Registry<O>, result: Result<T>, reply: oneshot::Sender<Result<T>>)
where
    O: Outbound,
    S: StateHolder,
{
    if result.is_ok() {
        persist(store, registry.state());
    }
    let _ = reply.send(result);
}

/// Write-through save. Failures are logged; in-memory state stays authoritative.
fn persist<S: StateHolder>(store: &S, state: &State) {
    if let Err(err) = store.set_state(state) {
        error!(error = %err, "failed to persist registry state");
    }
}
