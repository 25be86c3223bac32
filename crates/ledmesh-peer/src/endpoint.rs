use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ledmesh_frame::{Frame, FrameError, FrameReader, FrameWriter};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::codec::{EventCodec, JsonCodec};
use crate::envelope::MessageKind;
use crate::error::{PeerError, Result};
use crate::peer::{PeerConfig, PeerHandle};
use crate::table::Connections;

/// Application callbacks for one endpoint.
///
/// `event` is awaited before the next frame is read, so events from one
/// connection are handled in arrival order. Requests run on their own task
/// and may complete out of order.
pub trait Handler<E>: Send + Sync + 'static {
    /// A connection is up and registered in the endpoint's table.
    ///
    /// Runs before the first frame is read; issuing a request from here
    /// would wait for a response that cannot arrive yet.
    fn connected(&self, peer: PeerHandle<E>) -> impl Future<Output = ()> + Send {
        let _ = peer;
        async {}
    }

    /// The connection at `addr` is gone. Pending requests have already failed.
    fn disconnected(&self, addr: SocketAddr) -> impl Future<Output = ()> + Send {
        let _ = addr;
        async {}
    }

    fn event(&self, addr: SocketAddr, event: E) -> impl Future<Output = ()> + Send;

    fn request(&self, addr: SocketAddr, event: E) -> impl Future<Output = E> + Send;
}

/// Runs connections against a [`Handler`].
///
/// The same endpoint type serves both accepted and dialed streams.
pub struct Endpoint<E, H> {
    handler: Arc<H>,
    codec: Arc<dyn EventCodec<E>>,
    config: PeerConfig,
    connections: Connections<E>,
    shutdown: CancellationToken,
}

impl<E: 'static, H> Clone for Endpoint<E, H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            codec: Arc::clone(&self.codec),
            config: self.config.clone(),
            connections: self.connections.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<E, H> Endpoint<E, H>
where
    E: Serialize + DeserializeOwned + Send + 'static,
    H: Handler<E>,
{
    /// Endpoint speaking JSON envelopes.
    pub fn new(handler: H) -> Self {
        Self::with_codec(handler, Arc::new(JsonCodec))
    }
}

impl<E, H> Endpoint<E, H>
where
    E: Send + 'static,
    H: Handler<E>,
{
    pub fn with_codec(handler: H, codec: Arc<dyn EventCodec<E>>) -> Self {
        Self {
            handler: Arc::new(handler),
            codec,
            config: PeerConfig::default(),
            connections: Connections::default(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Override peer behavior config.
    pub fn with_config(mut self, config: PeerConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing connection table, e.g. one the handler also writes to.
    pub fn with_connections(mut self, connections: Connections<E>) -> Self {
        self.connections = connections;
        self
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    pub fn connections(&self) -> &Connections<E> {
        &self.connections
    }

    /// Close every connection and stop accepting or dialing new ones.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Serve a TCP connection until either side closes it.
    pub async fn serve_tcp(&self, stream: TcpStream) -> Result<()> {
        let addr = stream.peer_addr().map_err(ledmesh_transport::TransportError::Io)?;
        self.serve(stream, addr).await
    }

    /// Serve one connection until it closes, the idle timeout fires, or the
    /// endpoint shuts down.
    ///
    /// A clean close by the remote side returns `Ok(())`.
    pub async fn serve<S>(&self, stream: S, addr: SocketAddr) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (tx, rx) = mpsc::channel(self.config.outbound_capacity.max(1));
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let token = self.shutdown.child_token();
        let peer = PeerHandle::new(
            addr,
            tx,
            control_tx,
            Arc::clone(&self.codec),
            self.config.request_timeout,
            token.clone(),
        );

        let writer = FrameWriter::with_config(write_half, self.config.frame.clone());
        let writer_task = tokio::spawn(write_loop(
            writer,
            Outgoing {
                control: control_rx,
                data: rx,
            },
            token,
            self.config.heartbeat_interval,
            addr,
        ));

        self.connections.insert(peer.clone());
        debug!(addr = %addr, "peer connected");
        self.handler.connected(peer.clone()).await;

        let reader = FrameReader::with_config(read_half, self.config.frame.clone());
        let result = self.read_loop(reader, &peer).await;

        peer.close();
        self.connections.remove(&peer);
        peer.fail_pending();
        if let Err(err) = writer_task.await {
            warn!(addr = %addr, error = %err, "writer task failed");
        }
        match &result {
            Ok(()) => debug!(addr = %addr, "peer disconnected"),
            Err(err) => debug!(addr = %addr, error = %err, "peer dropped"),
        }
        self.handler.disconnected(addr).await;
        result
    }

    async fn read_loop<R>(&self, mut reader: FrameReader<R>, peer: &PeerHandle<E>) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let addr = peer.addr();
        let shutdown = peer.shutdown_token().clone();
        loop {
            let frame = tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                frame = next_frame(&mut reader, self.config.idle_timeout) => frame,
            };
            let payload = match frame {
                Ok(Frame::Heartbeat) => {
                    trace!(addr = %addr, "heartbeat");
                    continue;
                }
                Ok(Frame::Payload(payload)) => payload,
                Err(PeerError::Frame(FrameError::ConnectionClosed)) => return Ok(()),
                Err(err) => return Err(err),
            };

            let envelope = match peer.codec().unmarshal(&payload) {
                Ok(envelope) => envelope,
                Err(err) => {
                    warn!(addr = %addr, len = payload.len(), error = %err, "dropping undecodable frame");
                    continue;
                }
            };

            match envelope.kind {
                MessageKind::Event => self.handler.event(addr, envelope.event).await,
                MessageKind::Request => {
                    let handler = Arc::clone(&self.handler);
                    let peer = peer.clone();
                    let id = envelope.id;
                    let event = envelope.event;
                    tokio::spawn(async move {
                        let reply = handler.request(addr, event).await;
                        if let Err(err) = peer.respond(id, reply).await {
                            debug!(addr = %addr, id, error = %err, "could not send response");
                        }
                    });
                }
                MessageKind::Response => {
                    if !peer.complete(envelope.id, envelope.event) {
                        debug!(addr = %addr, id = envelope.id, "dropping response with no waiting request");
                    }
                }
            }
        }
    }
}

async fn next_frame<R>(reader: &mut FrameReader<R>, idle: Option<Duration>) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    match idle {
        Some(limit) => match tokio::time::timeout(limit, reader.read_frame()).await {
            Ok(frame) => Ok(frame?),
            Err(_) => Err(PeerError::IdleTimeout(limit)),
        },
        None => Ok(reader.read_frame().await?),
    }
}

/// Queues drained by one connection's writer task.
struct Outgoing {
    control: mpsc::UnboundedReceiver<Bytes>,
    data: mpsc::Receiver<Bytes>,
}

async fn write_loop<W>(
    mut writer: FrameWriter<W>,
    mut queues: Outgoing,
    shutdown: CancellationToken,
    heartbeat: Option<Duration>,
    addr: SocketAddr,
) where
    W: AsyncWrite + Unpin,
{
    let mut ticker = heartbeat.map(|period| {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = queues.control.recv() => next,
            next = queues.data.recv() => next,
            _ = tick(&mut ticker) => {
                if let Err(err) = writer.heartbeat().await {
                    debug!(addr = %addr, error = %err, "heartbeat failed, closing connection");
                    shutdown.cancel();
                    break;
                }
                continue;
            }
        };
        let Some(bytes) = next else { break };
        if let Some(ticker) = ticker.as_mut() {
            ticker.reset();
        }
        if let Err(err) = writer.send(bytes).await {
            debug!(addr = %addr, error = %err, "write failed, closing connection");
            shutdown.cancel();
            break;
        }
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
