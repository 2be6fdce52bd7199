//! Opening sources and dialing sinks by address.
//!
//! [`FlvConnector`] speaks FLV over TCP (the relay server's protocol) and
//! local files. [`SchemeConnector`] is what applications use: it adds RTMP.

use crate::address::MediaAddress;
use crate::endpoint::{FlvSink, FlvSource, MediaSink, MediaSource};
use crate::error::{MediaError, MediaResult};
use crate::handshake::{client_handshake, Request};
use async_trait::async_trait;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{BufReader, BufStream, BufWriter};
use tokio::net::TcpStream;
use tracing::debug;

/// Resolves addresses into open media handles.
#[async_trait]
pub trait MediaConnector: Send + Sync {
    async fn open_source(&self, address: &str) -> MediaResult<Box<dyn MediaSource>>;

    async fn dial_sink(&self, address: &str) -> MediaResult<Box<dyn MediaSink>>;
}

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// FLV over TCP or local files.
#[derive(Debug, Clone)]
pub struct FlvConnector {
    connect_timeout: Duration,
}

impl Default for FlvConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl FlvConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn connect(&self, address: &str, authority: &str) -> MediaResult<TcpStream> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(authority))
            .await
            .map_err(|_| MediaError::ConnectTimeout {
                address: address.to_string(),
            })?
            .map_err(|source| MediaError::ConnectFailed {
                address: address.to_string(),
                source,
            })?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

#[async_trait]
impl MediaConnector for FlvConnector {
    async fn open_source(&self, address: &str) -> MediaResult<Box<dyn MediaSource>> {
        let source = match address.parse::<MediaAddress>()? {
            MediaAddress::Tcp { authority, key } => {
                let mut stream = BufStream::new(self.connect(address, &authority).await?);
                if let Some(key) = key {
                    client_handshake(&mut stream, address, &Request::Play(key)).await?;
                }
                FlvSource::new(Box::new(stream))
            }
            MediaAddress::Rtmp { .. } => return Err(rtmp_unsupported(address)),
            MediaAddress::File(path) => {
                let file = File::open(&path).await.map_err(|source| MediaError::ConnectFailed {
                    address: address.to_string(),
                    source,
                })?;
                FlvSource::new(Box::new(BufReader::new(file)))
            }
        };

        debug!(address, "Opened media source");
        Ok(Box::new(source))
    }

    async fn dial_sink(&self, address: &str) -> MediaResult<Box<dyn MediaSink>> {
        let sink = match address.parse::<MediaAddress>()? {
            MediaAddress::Tcp { authority, key } => {
                let mut stream = BufStream::new(self.connect(address, &authority).await?);
                if let Some(key) = key {
                    client_handshake(&mut stream, address, &Request::Publish(key)).await?;
                }
                FlvSink::live(Box::new(stream))
            }
            MediaAddress::Rtmp { .. } => return Err(rtmp_unsupported(address)),
            MediaAddress::File(path) => {
                let file = File::create(&path).await.map_err(|source| MediaError::ConnectFailed {
                    address: address.to_string(),
                    source,
                })?;
                FlvSink::new(Box::new(BufWriter::new(file)))
            }
        };

        debug!(address, "Dialed media sink");
        Ok(Box::new(sink))
    }
}

fn rtmp_unsupported(address: &str) -> MediaError {
    MediaError::invalid_address(address, "RTMP needs a connector built with the `rtmp` feature")
}

/// Routes each address to the backend for its scheme: `rtmp://` and `rtmps://`
/// through FFmpeg when the `rtmp` feature is on, everything else through
/// [`FlvConnector`].
#[derive(Debug, Clone)]
pub struct SchemeConnector {
    flv: FlvConnector,
    #[cfg(feature = "rtmp")]
    rtmp: crate::rtmp::RtmpConnector,
}

impl Default for SchemeConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl SchemeConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            flv: FlvConnector::new(connect_timeout),
            #[cfg(feature = "rtmp")]
            rtmp: crate::rtmp::RtmpConnector::new(connect_timeout),
        }
    }

    fn backend(&self, address: &str) -> MediaResult<&dyn MediaConnector> {
        match address.parse::<MediaAddress>()? {
            #[cfg(feature = "rtmp")]
            MediaAddress::Rtmp { .. } => Ok(&self.rtmp),
            #[cfg(not(feature = "rtmp"))]
            MediaAddress::Rtmp { .. } => Err(rtmp_unsupported(address)),
            MediaAddress::Tcp { .. } | MediaAddress::File(_) => Ok(&self.flv),
        }
    }
}

#[async_trait]
impl MediaConnector for SchemeConnector {
    async fn open_source(&self, address: &str) -> MediaResult<Box<dyn MediaSource>> {
        self.backend(address)?.open_source(address).await
    }

    async fn dial_sink(&self, address: &str) -> MediaResult<Box<dyn MediaSink>> {
        self.backend(address)?.dial_sink(address).await
    }
}

/// Open `address`, read its stream descriptors, then close it again.
pub async fn probe_source(
    connector: &dyn MediaConnector,
    address: &str,
) -> MediaResult<Vec<crate::packet::StreamDescriptor>> {
    let mut source = connector.open_source(address).await?;
    let streams = source.streams().await;
    source.close().await?;
    streams
}
