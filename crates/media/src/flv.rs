//! FLV container framing.
//!
//! ```text
//! header:  "FLV" | version(1) | flags(1) | data offset(4)      = 9 bytes
//! then:    previous tag size(4) = 0
//! per tag: type(1) | data size(3) | timestamp(3) | ts ext(1) | stream id(3)
//!          data(data size) | previous tag size(4) = 11 + data size
//! ```

use crate::error::{MediaError, MediaResult};
use crate::packet::{Packet, PacketKind, StreamDescriptor};
use std::io::ErrorKind as IoErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const HEADER_LEN: usize = 9;
pub const TAG_HEADER_LEN: usize = 11;

const SIGNATURE: &[u8; 3] = b"FLV";
const VERSION: u8 = 1;
const FLAG_AUDIO: u8 = 0x04;
const FLAG_VIDEO: u8 = 0x01;
/// Tag payloads are limited by the 24-bit size field.
pub const MAX_TAG_DATA: usize = 0x00ff_ffff;

/// Encode the file header for the given tracks, including the zero
/// "previous tag size" that follows it.
pub fn encode_header(streams: &[StreamDescriptor]) -> [u8; HEADER_LEN + 4] {
    let mut flags = 0u8;
    for stream in streams {
        match stream {
            StreamDescriptor::Audio => flags |= FLAG_AUDIO,
            StreamDescriptor::Video => flags |= FLAG_VIDEO,
        }
    }

    let mut buf = [0u8; HEADER_LEN + 4];
    buf[..3].copy_from_slice(SIGNATURE);
    buf[3] = VERSION;
    buf[4] = flags;
    buf[5..9].copy_from_slice(&(HEADER_LEN as u32).to_be_bytes());
    buf
}

/// Parse the 9-byte file header into track descriptors and its data offset.
pub fn decode_header(buf: &[u8; HEADER_LEN]) -> MediaResult<(Vec<StreamDescriptor>, u32)> {
    if &buf[..3] != SIGNATURE {
        return Err(MediaError::Format("missing FLV signature".to_string()));
    }

    let offset = u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]);
    if (offset as usize) < HEADER_LEN {
        return Err(MediaError::Format(format!("invalid header length {}", offset)));
    }

    let mut streams = Vec::with_capacity(2);
    if buf[4] & FLAG_AUDIO != 0 {
        streams.push(StreamDescriptor::Audio);
    }
    if buf[4] & FLAG_VIDEO != 0 {
        streams.push(StreamDescriptor::Video);
    }
    Ok((streams, offset))
}

fn read_u24(b: &[u8]) -> u32 {
    (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2])
}

fn write_u24(b: &mut [u8], v: u32) {
    b[0] = (v >> 16) as u8;
    b[1] = (v >> 8) as u8;
    b[2] = v as u8;
}

/// Reads an FLV byte stream.
pub struct FlvReader<R> {
    inner: R,
    streams: Option<Vec<StreamDescriptor>>,
}

impl<R: AsyncRead + Unpin> FlvReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            streams: None,
        }
    }

    /// Read the file header on first call; later calls return the cached tracks.
    pub async fn read_header(&mut self) -> MediaResult<Vec<StreamDescriptor>> {
        if let Some(streams) = &self.streams {
            return Ok(streams.clone());
        }

        let mut buf = [0u8; HEADER_LEN];
        self.inner.read_exact(&mut buf).await.map_err(truncated("header"))?;
        let (streams, offset) = decode_header(&buf)?;

        // Skip any extension bytes, then the leading previous-tag-size.
        let skip = (offset as usize - HEADER_LEN) + 4;
        let mut rest = vec![0u8; skip];
        self.inner.read_exact(&mut rest).await.map_err(truncated("header"))?;

        self.streams = Some(streams.clone());
        Ok(streams)
    }

    /// Next tag, or `None` on a clean end of stream at a tag boundary.
    ///
    /// Tags of unknown type are skipped.
    pub async fn read_tag(&mut self) -> MediaResult<Option<Packet>> {
        if self.streams.is_none() {
            self.read_header().await?;
        }

        loop {
            let mut header = [0u8; TAG_HEADER_LEN];
            let first = self.inner.read(&mut header[..1]).await?;
            if first == 0 {
                return Ok(None);
            }
            self.inner
                .read_exact(&mut header[1..])
                .await
                .map_err(truncated("tag header"))?;

            let size = read_u24(&header[1..4]) as usize;
            let timestamp = read_u24(&header[4..7]) | (u32::from(header[7]) << 24);

            let mut data = vec![0u8; size];
            self.inner.read_exact(&mut data).await.map_err(truncated("tag data"))?;

            let mut trailer = [0u8; 4];
            self.inner
                .read_exact(&mut trailer)
                .await
                .map_err(truncated("previous tag size"))?;
            let previous = u32::from_be_bytes(trailer) as usize;
            if previous != TAG_HEADER_LEN + size {
                return Err(MediaError::Format(format!(
                    "previous tag size {} does not match tag length {}",
                    previous,
                    TAG_HEADER_LEN + size
                )));
            }

            match PacketKind::from_tag_type(header[0]) {
                Some(kind) => {
                    return Ok(Some(Packet {
                        kind,
                        timestamp,
                        data,
                    }))
                }
                None => continue,
            }
        }
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

fn truncated(what: &'static str) -> impl Fn(std::io::Error) -> MediaError {
    move |e| {
        if e.kind() == IoErrorKind::UnexpectedEof {
            MediaError::Format(format!("truncated {}", what))
        } else {
            MediaError::Io(e)
        }
    }
}

/// Writes an FLV byte stream.
pub struct FlvWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FlvWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub async fn write_header(&mut self, streams: &[StreamDescriptor]) -> MediaResult<()> {
        self.inner.write_all(&encode_header(streams)).await?;
        Ok(())
    }

    pub async fn write_tag(&mut self, packet: &Packet) -> MediaResult<()> {
        if packet.data.len() > MAX_TAG_DATA {
            return Err(MediaError::Format(format!(
                "packet of {} bytes exceeds tag limit",
                packet.data.len()
            )));
        }

        let mut header = [0u8; TAG_HEADER_LEN];
        header[0] = packet.kind.tag_type();
        write_u24(&mut header[1..4], packet.data.len() as u32);
        write_u24(&mut header[4..7], packet.timestamp & 0x00ff_ffff);
        header[7] = (packet.timestamp >> 24) as u8;

        self.inner.write_all(&header).await?;
        self.inner.write_all(&packet.data).await?;
        self.inner
            .write_all(&((TAG_HEADER_LEN + packet.data.len()) as u32).to_be_bytes())
            .await?;
        Ok(())
    }

    pub async fn flush(&mut self) -> MediaResult<()> {
        self.inner.flush().await?;
        Ok(())
    }

    /// Flush and shut down the underlying writer.
    pub async fn shutdown(&mut self) -> MediaResult<()> {
        self.inner.shutdown().await?;
        Ok(())
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_what_writer_produces() {
        let mut writer = FlvWriter::new(Vec::new());
        writer
            .write_header(&[StreamDescriptor::Audio, StreamDescriptor::Video])
            .await
            .unwrap();
        let packets = vec![
            Packet::new(PacketKind::Script, 0, b"meta".to_vec()),
            Packet::new(PacketKind::Video, 40, vec![0x17, 0x00, 0x01]),
            Packet::new(PacketKind::Audio, 0x0123_4567, vec![0xaf; 300]),
        ];
        for p in &packets {
            writer.write_tag(p).await.unwrap();
        }
        let bytes = writer.inner;

        let mut reader = FlvReader::new(bytes.as_slice());
        assert_eq!(
            reader.read_header().await.unwrap(),
            vec![StreamDescriptor::Audio, StreamDescriptor::Video]
        );
        for expected in &packets {
            assert_eq!(reader.read_tag().await.unwrap().as_ref(), Some(expected));
        }
        assert!(reader.read_tag().await.unwrap().is_none());
    }

    #[test]
    fn test_header_layout() {
        let header = encode_header(&[StreamDescriptor::Video]);
        assert_eq!(&header[..], &[b'F', b'L', b'V', 1, 0x01, 0, 0, 0, 9, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_rejects_bad_signature() {
        let bytes = b"MP4\x01\x05\x00\x00\x00\x09\x00\x00\x00\x00".to_vec();
        let mut reader = FlvReader::new(bytes.as_slice());
        assert!(matches!(reader.read_header().await, Err(MediaError::Format(_))));
    }

    #[tokio::test]
    async fn test_truncated_tag_is_format_error() {
        let mut bytes = encode_header(&[StreamDescriptor::Audio]).to_vec();
        bytes.extend_from_slice(&[8, 0, 0, 10, 0, 0, 0, 0, 0, 0, 0, 1, 2]);

        let mut reader = FlvReader::new(bytes.as_slice());
        let err = reader.read_tag().await.unwrap_err();
        assert!(err.to_string().contains("truncated tag data"), "{}", err);
    }

    #[tokio::test]
    async fn test_unknown_tags_are_skipped() {
        let mut bytes = encode_header(&[StreamDescriptor::Audio]).to_vec();
        bytes.extend_from_slice(&[0x1f, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0xee, 0, 0, 0, 12]);
        bytes.extend_from_slice(&[8, 0, 0, 1, 0, 0, 5, 0, 0, 0, 0, 0xaa, 0, 0, 0, 12]);

        let mut reader = FlvReader::new(bytes.as_slice());
        let packet = reader.read_tag().await.unwrap().unwrap();
        assert_eq!(packet, Packet::new(PacketKind::Audio, 5, vec![0xaa]));
    }
}
