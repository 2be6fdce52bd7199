//! Media side of a streaming session.
//!
//! - [`MediaSource`] / [`MediaSink`]: the read and write capabilities a relay consumes
//! - [`MediaConnector`]: resolves addresses into open handles ([`FlvConnector`] for
//!   FLV over TCP or files, `RtmpConnector` for RTMP through FFmpeg with the
//!   `rtmp` feature, [`SchemeConnector`] picking between them)
//! - [`MediaRelay`]: forwards one source to one destination, header first, packets in order
//! - [`flv`] and [`handshake`]: the wire format shared with the relay server

pub mod address;
pub mod connector;
pub mod endpoint;
pub mod error;
pub mod flv;
pub mod handshake;
pub mod packet;
pub mod relay;
#[cfg(feature = "rtmp")]
pub mod rtmp;

pub use address::MediaAddress;
pub use connector::{
    probe_source, FlvConnector, MediaConnector, SchemeConnector, DEFAULT_CONNECT_TIMEOUT,
};
pub use endpoint::{FlvSink, FlvSource, MediaSink, MediaSource};
pub use error::{MediaError, MediaResult};
pub use packet::{Packet, PacketKind, StreamDescriptor};
pub use relay::{MediaRelay, RelayEnd, RelayOutcome, RelayState};
#[cfg(feature = "rtmp")]
pub use rtmp::{RtmpConnector, RtmpSink, RtmpSource};
