//! TCP accept loop and per-connection publish/play handling.

use crate::error::{RegistryError, ServerError};
use crate::registry::{ChannelRegistry, DEFAULT_CHANNEL_CAPACITY};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use streamgate_media::flv::{FlvReader, FlvWriter};
use streamgate_media::handshake::{self, Request};
use tokio::io::BufStream;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:1936";

#[derive(Debug, Clone)]
pub struct RelayServerConfig {
    pub listen_addr: SocketAddr,
    pub channel_capacity: usize,
    /// Time a client has to send its request line.
    pub handshake_timeout: Duration,
}

impl Default for RelayServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 1936)),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

pub struct RelayServer {
    config: RelayServerConfig,
    registry: Arc<ChannelRegistry>,
}

impl RelayServer {
    pub fn new(config: RelayServerConfig) -> Self {
        let registry = Arc::new(ChannelRegistry::new(config.channel_capacity));
        Self { config, registry }
    }

    pub fn registry(&self) -> Arc<ChannelRegistry> {
        self.registry.clone()
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        info!("Relay server is listening on {}", listener.local_addr()?);
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                _ = &mut shutdown => {
                    info!("Relay server shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
            };

            let registry = self.registry.clone();
            let handshake_timeout = self.config.handshake_timeout;
            tokio::spawn(async move {
                if let Err(e) = handle_connection(registry, stream, handshake_timeout).await {
                    warn!(%peer, kind = %e.kind(), "Connection ended with error: {}", e);
                }
                debug!(%peer, "Connection closed");
            });
        }
    }
}

async fn handle_connection(
    registry: Arc<ChannelRegistry>,
    stream: TcpStream,
    handshake_timeout: Duration,
) -> Result<(), ServerError> {
    stream.set_nodelay(true)?;
    let mut stream = BufStream::new(stream);

    let line = tokio::time::timeout(handshake_timeout, handshake::read_line(&mut stream))
        .await
        .map_err(|_| ServerError::HandshakeTimeout {
            timeout_secs: handshake_timeout.as_secs(),
        })??;

    let request = match Request::parse(&line) {
        Ok(request) => request,
        Err(e) => {
            handshake::reject(&mut stream, &e.to_string()).await?;
            return Err(e.into());
        }
    };

    match request {
        Request::Publish(key) => publish(&registry, stream, &key).await,
        Request::Play(key) => play(&registry, stream, &key).await,
    }
}

async fn publish(
    registry: &ChannelRegistry,
    mut stream: BufStream<TcpStream>,
    key: &str,
) -> Result<(), ServerError> {
    if registry.contains(key).await {
        let err = RegistryError::AlreadyPublishing {
            key: key.to_string(),
        };
        handshake::reject(&mut stream, &err.to_string()).await?;
        return Err(err.into());
    }
    handshake::accept(&mut stream).await?;

    let mut reader = FlvReader::new(stream);
    let streams = reader.read_header().await?;
    let channel = registry.register(key, streams).await?;
    info!("New publish connection {}", key);

    let result = loop {
        match reader.read_tag().await {
            Ok(Some(packet)) => {
                channel.publish(packet);
            }
            Ok(None) => break Ok(()),
            Err(e) => break Err(e.into()),
        }
    };

    registry.remove(key).await;
    info!("Publish connection {} closed", key);
    result
}

async fn play(
    registry: &ChannelRegistry,
    mut stream: BufStream<TcpStream>,
    key: &str,
) -> Result<(), ServerError> {
    let (streams, mut packets) = match registry.lookup(key).await {
        Ok(channel) => (channel.streams().to_vec(), channel.subscribe()),
        Err(e) => {
            handshake::reject(&mut stream, &e.to_string()).await?;
            return Err(e.into());
        }
    };
    handshake::accept(&mut stream).await?;
    info!("New play connection {}", key);

    let mut writer = FlvWriter::new(stream);
    writer.write_header(&streams).await?;
    writer.flush().await?;

    loop {
        match packets.recv().await {
            Ok(packet) => {
                writer.write_tag(&packet).await?;
                writer.flush().await?;
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(key, skipped, "Player fell behind, skipping packets");
            }
            Err(RecvError::Closed) => break,
        }
    }

    writer.shutdown().await?;
    info!("Play connection {} closed", key);
    Ok(())
}
