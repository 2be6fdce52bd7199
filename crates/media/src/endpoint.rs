//! Source and sink capabilities and their FLV implementations.

use crate::error::{MediaError, MediaResult};
use crate::flv::{FlvReader, FlvWriter};
use crate::packet::{Packet, StreamDescriptor};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// Readable media endpoint.
#[async_trait]
pub trait MediaSource: Send {
    /// Tracks carried by this source. Reads the container header on first use.
    async fn streams(&mut self) -> MediaResult<Vec<StreamDescriptor>>;

    /// Next packet in order; `None` marks the end of the stream.
    async fn read_packet(&mut self) -> MediaResult<Option<Packet>>;

    /// Release the handle. Closing twice is a no-op.
    async fn close(&mut self) -> MediaResult<()>;
}

/// Writable media endpoint.
#[async_trait]
pub trait MediaSink: Send {
    async fn write_header(&mut self, streams: &[StreamDescriptor]) -> MediaResult<()>;

    async fn write_packet(&mut self, packet: &Packet) -> MediaResult<()>;

    /// Flush and release the handle. Closing twice is a no-op.
    async fn close(&mut self) -> MediaResult<()>;
}

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// [`MediaSource`] over an FLV byte stream.
pub struct FlvSource {
    reader: Option<FlvReader<BoxedReader>>,
}

impl FlvSource {
    pub fn new(reader: BoxedReader) -> Self {
        Self {
            reader: Some(FlvReader::new(reader)),
        }
    }

    fn reader(&mut self) -> MediaResult<&mut FlvReader<BoxedReader>> {
        self.reader.as_mut().ok_or(MediaError::Closed)
    }
}

#[async_trait]
impl MediaSource for FlvSource {
    async fn streams(&mut self) -> MediaResult<Vec<StreamDescriptor>> {
        self.reader()?.read_header().await
    }

    async fn read_packet(&mut self) -> MediaResult<Option<Packet>> {
        self.reader()?.read_tag().await
    }

    async fn close(&mut self) -> MediaResult<()> {
        // Dropping the reader releases the socket or file.
        self.reader.take();
        Ok(())
    }
}

/// [`MediaSink`] producing an FLV byte stream.
pub struct FlvSink {
    writer: Option<FlvWriter<BoxedWriter>>,
    header_written: bool,
    flush_each_packet: bool,
}

impl FlvSink {
    pub fn new(writer: BoxedWriter) -> Self {
        Self {
            writer: Some(FlvWriter::new(writer)),
            header_written: false,
            flush_each_packet: false,
        }
    }

    /// Sink for a live peer: the header and every packet are flushed as soon as written.
    pub fn live(writer: BoxedWriter) -> Self {
        Self {
            flush_each_packet: true,
            ..Self::new(writer)
        }
    }

    fn writer(&mut self) -> MediaResult<&mut FlvWriter<BoxedWriter>> {
        self.writer.as_mut().ok_or(MediaError::Closed)
    }
}

#[async_trait]
impl MediaSink for FlvSink {
    async fn write_header(&mut self, streams: &[StreamDescriptor]) -> MediaResult<()> {
        if self.header_written {
            return Err(MediaError::Format("header already written".to_string()));
        }
        let flush = self.flush_each_packet;
        let writer = self.writer()?;
        writer.write_header(streams).await?;
        if flush {
            writer.flush().await?;
        }
        self.header_written = true;
        Ok(())
    }

    async fn write_packet(&mut self, packet: &Packet) -> MediaResult<()> {
        if !self.header_written {
            return Err(MediaError::Format("packet written before header".to_string()));
        }
        let flush = self.flush_each_packet;
        let writer = self.writer()?;
        writer.write_tag(packet).await?;
        if flush {
            writer.flush().await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> MediaResult<()> {
        match self.writer.take() {
            Some(mut writer) => {
                writer.flush().await?;
                writer.shutdown().await
            }
            None => Ok(()),
        }
    }
}
