use std::time::Duration;

use ledmesh_transport::{dial_with_retry, DialConfig, Resolver};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::endpoint::{Endpoint, Handler};

/// Dial one of the resolver's candidates, retrying with backoff until one
/// accepts.
pub async fn connect<R>(resolver: &R, config: &DialConfig) -> TcpStream
where
    R: Resolver + ?Sized,
{
    let (stream, addr) = dial_with_retry(resolver, config).await;
    debug!(addr = %addr, "dialed");
    stream
}

/// Keep a client connection up until the endpoint shuts down.
///
/// Each time the connection drops the resolver is consulted again, so a
/// registry that moved is picked up on the next round.
pub async fn run_client<E, H, R>(endpoint: Endpoint<E, H>, resolver: R, config: DialConfig)
where
    E: Send + 'static,
    H: Handler<E>,
    R: Resolver,
{
    let shutdown = endpoint.shutdown_token().clone();
    loop {
        let (stream, addr) = tokio::select! {
            _ = shutdown.cancelled() => break,
            dialed = dial_with_retry(&resolver, &config) => dialed,
        };
        info!(addr = %addr, "connected");

        match endpoint.serve_tcp(stream).await {
            Ok(()) => info!(addr = %addr, "connection closed"),
            Err(err) => warn!(addr = %addr, error = %err, "connection lost"),
        }
        if shutdown.is_cancelled() {
            break;
        }
        // Pause before redialing.
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(RECONNECT_PAUSE) => {}
        }
    }
    debug!("client loop stopped");
}

const RECONNECT_PAUSE: Duration = Duration::from_millis(250);
