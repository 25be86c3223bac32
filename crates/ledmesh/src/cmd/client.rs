//! Short-lived operator connection to a running registry.

use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};

use ledmesh_peer::{Endpoint, Handler, PeerConfig, PeerHandle};
use ledmesh_proto::{Event, State};
use ledmesh_transport::{dial, DialConfig};
use tokio::sync::oneshot;
use tracing::debug;

use crate::cmd::{parse_timeout, RegistryArgs};
use crate::exit::{peer_error, transport_error, CliError, CliResult, FAILURE};

/// Hands the connection's peer handle back once it is registered.
struct Operator {
    ready: Mutex<Option<oneshot::Sender<PeerHandle<Event>>>>,
}

impl Handler<Event> for Operator {
    async fn connected(&self, peer: PeerHandle<Event>) {
        let ready = self
            .ready
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(ready) = ready {
            let _ = ready.send(peer);
        }
    }

    async fn event(&self, addr: SocketAddr, event: Event) {
        debug!(addr = %addr, event = event.name(), "ignoring registry event");
    }

    async fn request(&self, _addr: SocketAddr, event: Event) -> Event {
        Event::nack(format!("operator cannot serve {}", event.name()))
    }
}

pub struct RegistryClient {
    endpoint: Endpoint<Event, Operator>,
    peer: PeerHandle<Event>,
}

impl RegistryClient {
    pub async fn connect(args: &RegistryArgs) -> CliResult<Self> {
        let timeout = parse_timeout(&args.timeout)?;
        let dial_config = DialConfig {
            timeout,
            ..DialConfig::default()
        };
        let stream = dial(args.registry, &dial_config)
            .await
            .map_err(|err| transport_error("connect failed", err))?;

        let (ready, peer) = oneshot::channel();
        let endpoint = Endpoint::new(Operator {
            ready: Mutex::new(Some(ready)),
        })
        .with_config(PeerConfig {
            request_timeout: timeout,
            ..PeerConfig::default()
        });
        let serving = endpoint.clone();
        let addr = args.registry;
        tokio::spawn(async move {
            if let Err(err) = serving.serve(stream, addr).await {
                debug!(addr = %addr, error = %err, "registry connection ended");
            }
        });

        let peer = peer
            .await
            .map_err(|_| CliError::new(FAILURE, "registry connection closed"))?;
        Ok(Self { endpoint, peer })
    }

    pub async fn request(&self, event: Event) -> CliResult<Event> {
        self.peer
            .request(event)
            .await
            .map_err(|err| peer_error("request failed", err))
    }

    /// Send a request that is answered with a bare `Ack`.
    pub async fn command(&self, event: Event) -> CliResult<()> {
        match self.request(event).await? {
            Event::Ack { error: None } => Ok(()),
            Event::Ack { error: Some(reason) } => Err(CliError::new(FAILURE, reason)),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn state(&self) -> CliResult<State> {
        match self.request(Event::GetState).await? {
            Event::Snapshot { state } => Ok(state),
            Event::Ack { error: Some(reason) } => Err(CliError::new(FAILURE, reason)),
            other => Err(unexpected(&other)),
        }
    }

    pub fn close(self) {
        self.endpoint.shutdown();
    }
}

pub(super) fn unexpected(reply: &Event) -> CliError {
    CliError::new(FAILURE, format!("unexpected reply {}", reply.name()))
}
