use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use ledmesh_frame::FrameConfig;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::codec::EventCodec;
use crate::envelope::Envelope;
use crate::error::{PeerError, Result};

/// Per-connection behavior.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Frame codec limits.
    pub frame: FrameConfig,
    /// How long `request` waits for the matching response.
    pub request_timeout: Duration,
    /// Send a heartbeat frame after this much outbound silence.
    pub heartbeat_interval: Option<Duration>,
    /// Close the connection when nothing arrives for this long.
    pub idle_timeout: Option<Duration>,
    /// Frames queued per connection before `try_send` starts dropping.
    pub outbound_capacity: usize,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            request_timeout: Duration::from_secs(5),
            heartbeat_interval: Some(Duration::from_secs(2)),
            idle_timeout: Some(Duration::from_secs(10)),
            outbound_capacity: 256,
        }
    }
}

/// Cloneable handle to one live connection.
///
/// All writes go through queues drained by the connection's writer task, so
/// handles can be used from any task without locking the socket. Control
/// events use an unbounded queue the writer drains before the bounded data
/// queue; they are never dropped and keep the order they were issued in.
pub struct PeerHandle<E> {
    inner: Arc<PeerInner<E>>,
}

struct PeerInner<E> {
    addr: SocketAddr,
    outbound: mpsc::Sender<Bytes>,
    control: mpsc::UnboundedSender<Bytes>,
    codec: Arc<dyn EventCodec<E>>,
    pending: Mutex<HashMap<u64, oneshot::Sender<E>>>,
    next_id: AtomicU64,
    request_timeout: Duration,
    shutdown: CancellationToken,
}

impl<E: 'static> Clone for PeerHandle<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: 'static> fmt::Debug for PeerHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerHandle")
            .field("addr", &self.inner.addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<E: 'static> PeerHandle<E> {
    pub(crate) fn new(
        addr: SocketAddr,
        outbound: mpsc::Sender<Bytes>,
        control: mpsc::UnboundedSender<Bytes>,
        codec: Arc<dyn EventCodec<E>>,
        request_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(PeerInner {
                addr,
                outbound,
                control,
                codec,
                pending: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                request_timeout,
                shutdown,
            }),
        }
    }

    /// Remote address; the session key for this connection.
    pub fn addr(&self) -> SocketAddr {
        self.inner.addr
    }

    /// Close the connection. The read loop returns and the handler sees a disconnect.
    pub fn close(&self) {
        self.inner.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// True if both handles refer to the same connection.
    pub fn same_connection(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Fire-and-forget event. Waits for queue space.
    pub async fn send(&self, event: E) -> Result<()> {
        self.enqueue(Envelope::event(event)).await
    }

    /// Fire-and-forget event without waiting; fails with `QueueFull` instead.
    pub fn try_send(&self, event: E) -> Result<()> {
        let bytes = self.marshal(Envelope::event(event))?;
        self.inner.outbound.try_send(bytes).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => PeerError::QueueFull(self.inner.addr),
            mpsc::error::TrySendError::Closed(_) => PeerError::ClosedPipe(self.inner.addr),
        })
    }

    /// Queue a control event without waiting.
    ///
    /// Control events reach the remote side in the order they were queued and
    /// ahead of any data still waiting in the bounded queue.
    pub fn send_control(&self, event: E) -> Result<()> {
        let bytes = self.marshal(Envelope::event(event))?;
        self.inner
            .control
            .send(bytes)
            .map_err(|_| PeerError::ClosedPipe(self.inner.addr))
    }

    /// Send a request and wait for the response with the same correlation id.
    ///
    /// On timeout the correlation entry is discarded, so a late reply is dropped.
    pub async fn request(&self, event: E) -> Result<E> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending().insert(id, tx);

        if let Err(err) = self.enqueue(Envelope::request(id, event)).await {
            self.pending().remove(&id);
            return Err(err);
        }

        match tokio::time::timeout(self.inner.request_timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(PeerError::Disconnected(format!(
                "{} closed with request {id} pending",
                self.inner.addr
            ))),
            Err(_) => {
                self.pending().remove(&id);
                Err(PeerError::Timeout(self.inner.request_timeout))
            }
        }
    }

    pub(crate) async fn respond(&self, id: u64, event: E) -> Result<()> {
        self.enqueue(Envelope::response(id, event)).await
    }

    /// Route a response to its waiting request. Returns false if nobody waits.
    pub(crate) fn complete(&self, id: u64, event: E) -> bool {
        match self.pending().remove(&id) {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Drop every waiting request; their callers observe a disconnect.
    pub(crate) fn fail_pending(&self) {
        let dropped = std::mem::take(&mut *self.pending());
        if !dropped.is_empty() {
            debug!(addr = %self.inner.addr, count = dropped.len(), "failing pending requests");
        }
    }

    pub(crate) fn codec(&self) -> &dyn EventCodec<E> {
        self.inner.codec.as_ref()
    }

    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown
    }

    async fn enqueue(&self, envelope: Envelope<E>) -> Result<()> {
        let bytes = self.marshal(envelope)?;
        self.inner
            .outbound
            .send(bytes)
            .await
            .map_err(|_| PeerError::ClosedPipe(self.inner.addr))
    }

    fn marshal(&self, envelope: Envelope<E>) -> Result<Bytes> {
        if self.is_closed() {
            return Err(PeerError::ClosedPipe(self.inner.addr));
        }
        self.inner.codec.marshal(&envelope)
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<E>>> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
