use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use ledmesh_peer::{PeerError, PeerHandle};
use ledmesh_proto::{Event, NodeId, OutputFrame};
use tracing::trace;

/// The node's current connection to the registry, if any.
#[derive(Clone, Default)]
pub struct RegistryLink {
    current: Arc<RwLock<Option<PeerHandle<Event>>>>,
}

impl std::fmt::Debug for RegistryLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryLink")
            .field("registry", &self.registry_addr())
            .finish()
    }
}

impl RegistryLink {
    pub fn set(&self, peer: PeerHandle<Event>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(peer);
    }

    /// Forget the registry connection if it is still the one at `addr`.
    pub fn clear(&self, addr: SocketAddr) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if current.as_ref().is_some_and(|peer| peer.addr() == addr) {
            *current = None;
        }
    }

    pub fn registry_addr(&self) -> Option<SocketAddr> {
        self.peer().map(|peer| peer.addr())
    }

    pub fn is_connected(&self) -> bool {
        self.peer().is_some()
    }

    pub fn frames(&self) -> FrameSender {
        FrameSender { link: self.clone() }
    }

    fn peer(&self) -> Option<PeerHandle<Event>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Handed to inputs so they can emit data frames.
///
/// Frames are dropped, not buffered, while the registry is unreachable or
/// the connection's queue is full. A late frame is a stale frame.
#[derive(Debug, Clone)]
pub struct FrameSender {
    link: RegistryLink,
}

impl FrameSender {
    /// Send one frame for `sink`'s outputs. Returns whether it was queued.
    pub fn send(&self, sink: &NodeId, outputs: Vec<OutputFrame>, latency: Duration) -> bool {
        let Some(peer) = self.link.peer() else {
            trace!(sink = %sink, "no registry, frame dropped");
            return false;
        };
        let event = Event::Data {
            sink_id: sink.clone(),
            outputs,
            latency: u64::try_from(latency.as_micros()).unwrap_or(u64::MAX),
        };
        match peer.try_send(event) {
            Ok(()) => true,
            Err(PeerError::QueueFull(_)) => {
                trace!(sink = %sink, "registry queue full, frame dropped");
                false
            }
            Err(err) => {
                trace!(sink = %sink, error = %err, "frame dropped");
                false
            }
        }
    }
}
