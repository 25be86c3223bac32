use std::net::SocketAddr;

use ledmesh_transport::TcpTransport;
use tracing::{debug, info, warn};

use crate::endpoint::{Endpoint, Handler};
use crate::error::Result;

/// Accepts TCP connections and serves each one on its own task.
pub struct PeerListener<E, H> {
    transport: Option<TcpTransport>,
    endpoint: Endpoint<E, H>,
}

impl<E, H> PeerListener<E, H>
where
    E: Send + 'static,
    H: Handler<E>,
{
    /// Bind on all interfaces. `None` disables listening entirely; [`run`]
    /// then returns immediately.
    ///
    /// [`run`]: PeerListener::run
    pub async fn bind(port: Option<u16>, endpoint: Endpoint<E, H>) -> Result<Self> {
        let transport = match port {
            Some(port) => Some(TcpTransport::bind(port).await?),
            None => None,
        };
        Ok(Self {
            transport,
            endpoint,
        })
    }

    /// Bind on an explicit address.
    pub async fn bind_addr(addr: SocketAddr, endpoint: Endpoint<E, H>) -> Result<Self> {
        Ok(Self {
            transport: Some(TcpTransport::bind_addr(addr).await?),
            endpoint,
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.as_ref().map(TcpTransport::local_addr)
    }

    pub fn endpoint(&self) -> &Endpoint<E, H> {
        &self.endpoint
    }

    /// Accept until the endpoint shuts down.
    ///
    /// Accept errors are logged and the loop keeps going.
    pub async fn run(self) -> Result<()> {
        let Some(transport) = self.transport else {
            info!("listener disabled, no port configured");
            return Ok(());
        };
        info!(addr = %transport.local_addr(), "listening");

        let shutdown = self.endpoint.shutdown_token().clone();
        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = transport.accept() => accepted,
            };
            let (stream, addr) = match accepted {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    continue;
                }
            };

            let endpoint = self.endpoint.clone();
            tokio::spawn(async move {
                if let Err(err) = endpoint.serve(stream, addr).await {
                    debug!(addr = %addr, error = %err, "connection ended with error");
                }
            });
        }

        info!("listener stopped");
        Ok(())
    }
}
