use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::backoff::{Backoff, BackoffPolicy};
use crate::discovery::Resolver;
use crate::error::{Result, TransportError};

/// Dial behavior for outbound connections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DialConfig {
    /// Timeout for a single connect attempt.
    pub timeout: Duration,
    /// Delay policy between failed rounds.
    pub backoff: BackoffPolicy,
    /// Disable Nagle's algorithm on established streams.
    pub nodelay: bool,
}

impl Default for DialConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            backoff: BackoffPolicy::default(),
            nodelay: true,
        }
    }
}

/// Listening TCP transport.
///
/// Binds on all interfaces at the configured port and hands out accepted
/// streams with `TCP_NODELAY` applied.
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind on `0.0.0.0:port`. Port 0 picks an ephemeral port.
    pub async fn bind(port: u16) -> Result<Self> {
        Self::bind_addr(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await
    }

    /// Bind on an explicit address.
    pub async fn bind_addr(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| TransportError::Bind { addr, source })?;

        info!(addr = %local_addr, "listening for connections");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept the next incoming connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = self.listener.accept().await.map_err(TransportError::Accept)?;
        if let Err(err) = stream.set_nodelay(true) {
            warn!(peer = %peer, error = %err, "failed to set TCP_NODELAY");
        }
        debug!(peer = %peer, "accepted connection");
        Ok((stream, peer))
    }

    /// The address this transport is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Single connect attempt bounded by `config.timeout`.
pub async fn dial(addr: SocketAddr, config: &DialConfig) -> Result<TcpStream> {
    let stream = match tokio::time::timeout(config.timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => return Err(TransportError::Connect { addr, source }),
        Err(_) => {
            return Err(TransportError::ConnectTimeout {
                addr,
                timeout: config.timeout,
            })
        }
    };
    if config.nodelay {
        stream.set_nodelay(true)?;
    }
    debug!(addr = %addr, "connected");
    Ok(stream)
}

/// Dial until one of the resolver's candidates accepts.
///
/// Each round tries every candidate once in order; between rounds the task
/// sleeps according to the backoff policy. Every call starts its own backoff
/// at `base`. This never gives up, so callers
/// that need cancellation should race it against their shutdown signal.
pub async fn dial_with_retry<R>(resolver: &R, config: &DialConfig) -> (TcpStream, SocketAddr)
where
    R: Resolver + ?Sized,
{
    let mut backoff = Backoff::new(config.backoff);
    loop {
        let candidates = resolver.resolve();
        if candidates.is_empty() {
            debug!(error = %TransportError::NoCandidates, "resolver returned nothing");
        }
        for addr in candidates {
            match dial(addr, config).await {
                Ok(stream) => return (stream, addr),
                Err(err) => debug!(error = %err, "dial attempt failed"),
            }
        }
        let delay = backoff.next_delay();
        debug!(delay = ?delay, "retrying dial");
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::discovery::StaticResolver;

    #[tokio::test]
    async fn bind_accept_dial() {
        let transport = TcpTransport::bind_addr("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = transport.local_addr();

        let client = tokio::spawn(async move {
            let mut stream = dial(addr, &DialConfig::default()).await.unwrap();
            stream.write_all(b"hello").await.unwrap();
        });

        let (mut server, _) = transport.accept().await.unwrap();
        assert!(server.nodelay().unwrap());
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        client.await.unwrap();
    }

    #[tokio::test]
    async fn dial_refused_reports_connect_error() {
        let transport = TcpTransport::bind_addr("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = transport.local_addr();
        drop(transport);

        let err = dial(addr, &DialConfig::default()).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[tokio::test]
    async fn dial_with_retry_waits_for_listener() {
        // Reserve a port, release it, and bring the listener up after a delay.
        let reserved = TcpTransport::bind_addr("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = reserved.local_addr();
        drop(reserved);

        let config = DialConfig {
            timeout: Duration::from_millis(200),
            backoff: BackoffPolicy {
                base: Duration::from_millis(20),
                max: Duration::from_millis(50),
                jitter: 0.0,
            },
            nodelay: true,
        };

        let server = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let transport = TcpTransport::bind_addr(addr).await.unwrap();
            transport.accept().await.unwrap();
        });

        let resolver = StaticResolver::new([addr]);
        let (_stream, dialed) = tokio::time::timeout(
            Duration::from_secs(5),
            dial_with_retry(&resolver, &config),
        )
        .await
        .expect("dial should eventually succeed");
        assert_eq!(dialed, addr);

        server.await.unwrap();
    }
}
