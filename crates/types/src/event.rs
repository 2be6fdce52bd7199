//! Decoded stream-manager ledger events.

use crate::SessionId;
use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of events emitted by the stream manager contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    StreamRequested,
    StreamCreated,
    StreamApproved,
    InputChunkAdded,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StreamRequested => "EventStreamRequested",
            Self::StreamCreated => "EventStreamCreated",
            Self::StreamApproved => "EventStreamApproved",
            Self::InputChunkAdded => "EventStreamInputChunkAdded",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fields every ledger event carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMeta {
    /// Address of the contract that emitted the log.
    pub address: Address,
    pub session_id: SessionId,
    pub block_number: u64,
    pub block_hash: B256,
    pub tx_hash: B256,
    pub tx_index: u64,
}

/// A log observed on the ledger. Never mutated after decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum LedgerEvent {
    StreamRequested(EventMeta),
    StreamCreated {
        #[serde(flatten)]
        meta: EventMeta,
        /// Per-session contract deployed by `createStream`.
        stream_address: Address,
    },
    StreamApproved(EventMeta),
    InputChunkAdded {
        #[serde(flatten)]
        meta: EventMeta,
        chunk_id: U256,
    },
}

impl LedgerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::StreamRequested(_) => EventKind::StreamRequested,
            Self::StreamCreated { .. } => EventKind::StreamCreated,
            Self::StreamApproved(_) => EventKind::StreamApproved,
            Self::InputChunkAdded { .. } => EventKind::InputChunkAdded,
        }
    }

    pub fn meta(&self) -> &EventMeta {
        match self {
            Self::StreamRequested(meta) | Self::StreamApproved(meta) => meta,
            Self::StreamCreated { meta, .. } | Self::InputChunkAdded { meta, .. } => meta,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.meta().session_id
    }

    /// Derived session contract address, only present on `StreamCreated`.
    pub fn stream_address(&self) -> Option<Address> {
        match self {
            Self::StreamCreated { stream_address, .. } => Some(*stream_address),
            _ => None,
        }
    }
}

impl fmt::Display for LedgerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let meta = self.meta();
        writeln!(f, "{}", self.kind())?;
        writeln!(f, "\tAddress: {}", meta.address)?;
        writeln!(f, "\tStreamId: {}", meta.session_id)?;
        match self {
            Self::StreamCreated { stream_address, .. } => {
                writeln!(f, "\tStreamAddress: {}", stream_address)?;
            }
            Self::InputChunkAdded { chunk_id, .. } => {
                writeln!(f, "\tChunkId: {}", chunk_id)?;
            }
            _ => {}
        }
        writeln!(f, "\tBlockNumber: {}", meta.block_number)?;
        writeln!(f, "\tBlockHash: {}", meta.block_hash)?;
        writeln!(f, "\tTxHash: {}", meta.tx_hash)?;
        writeln!(f, "\tTxIndex: {}", meta.tx_index)
    }
}
