//! Stream descriptors and packets exchanged between sources and sinks.

use std::fmt;

/// Track carried by a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamDescriptor {
    Audio,
    Video,
}

impl fmt::Display for StreamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamDescriptor::Audio => f.write_str("audio"),
            StreamDescriptor::Video => f.write_str("video"),
        }
    }
}

/// Payload type of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    Audio,
    Video,
    /// Metadata (onMetaData and friends).
    Script,
}

impl PacketKind {
    pub(crate) fn tag_type(self) -> u8 {
        match self {
            PacketKind::Audio => 8,
            PacketKind::Video => 9,
            PacketKind::Script => 18,
        }
    }

    pub(crate) fn from_tag_type(tag_type: u8) -> Option<Self> {
        match tag_type & 0x1f {
            8 => Some(PacketKind::Audio),
            9 => Some(PacketKind::Video),
            18 => Some(PacketKind::Script),
            _ => None,
        }
    }
}

/// One unit of media, forwarded opaquely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketKind,
    /// Presentation timestamp in milliseconds.
    pub timestamp: u32,
    pub data: Vec<u8>,
}

impl Packet {
    pub fn new(kind: PacketKind, timestamp: u32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            timestamp,
            data: data.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
