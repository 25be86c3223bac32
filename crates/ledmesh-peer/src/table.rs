use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{PeerError, Result};
use crate::peer::PeerHandle;

/// Live connections of an endpoint, keyed by remote address.
pub struct Connections<E> {
    inner: Arc<RwLock<HashMap<SocketAddr, PeerHandle<E>>>>,
}

impl<E: 'static> Clone for Connections<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: 'static> Default for Connections<E> {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<E: 'static> std::fmt::Debug for Connections<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connections")
            .field("addrs", &self.addrs())
            .finish()
    }
}

impl<E: 'static> Connections<E> {
    pub fn get(&self, addr: &SocketAddr) -> Option<PeerHandle<E>> {
        self.read().get(addr).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn addrs(&self) -> Vec<SocketAddr> {
        self.read().keys().copied().collect()
    }

    /// Close every live connection.
    pub fn close_all(&self) {
        for peer in self.read().values() {
            peer.close();
        }
    }

    /// Send an event to `addr`, waiting for queue space.
    pub async fn write(&self, addr: SocketAddr, event: E) -> Result<()> {
        self.require(&addr)?.send(event).await
    }

    /// Send an event to `addr` or fail immediately if its queue is full.
    pub fn try_write(&self, addr: SocketAddr, event: E) -> Result<()> {
        self.require(&addr)?.try_send(event)
    }

    /// Queue a control event for `addr` without waiting. See [`PeerHandle::send_control`].
    pub fn send_control(&self, addr: SocketAddr, event: E) -> Result<()> {
        self.require(&addr)?.send_control(event)
    }

    /// Request/response against `addr`.
    pub async fn request(&self, addr: SocketAddr, event: E) -> Result<E> {
        self.require(&addr)?.request(event).await
    }

    pub(crate) fn insert(&self, peer: PeerHandle<E>) {
        let previous = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(peer.addr(), peer);
        if let Some(previous) = previous {
            previous.close();
        }
    }

    /// Remove `peer` unless the slot has since been taken by a newer connection.
    pub(crate) fn remove(&self, peer: &PeerHandle<E>) {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if map
            .get(&peer.addr())
            .is_some_and(|current| current.same_connection(peer))
        {
            map.remove(&peer.addr());
        }
    }

    fn require(&self, addr: &SocketAddr) -> Result<PeerHandle<E>> {
        self.get(addr).ok_or(PeerError::ClosedPipe(*addr))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<SocketAddr, PeerHandle<E>>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}
