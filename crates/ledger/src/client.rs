//! The ledger capability consumed by the orchestration core.

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use streamgate_types::{Address, EventKind, LedgerEvent, SessionId, B256, U256};

/// Log filter for one stream-manager event kind.
///
/// Empty vectors mean "any value" for that indexed field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFilter {
    StreamRequested {
        clients: Vec<Address>,
        session_ids: Vec<SessionId>,
    },
    StreamCreated {
        stream_addresses: Vec<Address>,
        session_ids: Vec<SessionId>,
    },
    StreamApproved {
        session_ids: Vec<SessionId>,
    },
    InputChunkAdded {
        session_ids: Vec<SessionId>,
        chunk_ids: Vec<U256>,
    },
}

impl EventFilter {
    pub fn stream_requested(client: Address, session_id: SessionId) -> Self {
        EventFilter::StreamRequested {
            clients: vec![client],
            session_ids: vec![session_id],
        }
    }

    pub fn stream_created(session_id: SessionId) -> Self {
        EventFilter::StreamCreated {
            stream_addresses: Vec::new(),
            session_ids: vec![session_id],
        }
    }

    pub fn stream_approved(session_id: SessionId) -> Self {
        EventFilter::StreamApproved {
            session_ids: vec![session_id],
        }
    }

    pub fn input_chunk_added(session_id: SessionId, chunk_id: U256) -> Self {
        EventFilter::InputChunkAdded {
            session_ids: vec![session_id],
            chunk_ids: vec![chunk_id],
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            EventFilter::StreamRequested { .. } => EventKind::StreamRequested,
            EventFilter::StreamCreated { .. } => EventKind::StreamCreated,
            EventFilter::StreamApproved { .. } => EventKind::StreamApproved,
            EventFilter::InputChunkAdded { .. } => EventKind::InputChunkAdded,
        }
    }

    /// Check a decoded event against the fields this filter can see.
    ///
    /// [`EventWatcher`](crate::EventWatcher) applies this to every log a
    /// [`LedgerClient::query_events`] call returns, and in-memory clients can
    /// use it to answer queries. The `client` topic of `StreamRequested` is
    /// not part of the decoded event, so only the ledger can enforce it.
    pub fn matches(&self, event: &LedgerEvent) -> bool {
        if event.kind() != self.kind() {
            return false;
        }

        let session_ok = |ids: &[SessionId]| ids.is_empty() || ids.contains(&event.session_id());

        match (self, event) {
            (EventFilter::StreamRequested { session_ids, .. }, _) => session_ok(session_ids),
            (EventFilter::StreamApproved { session_ids }, _) => session_ok(session_ids),
            (
                EventFilter::StreamCreated {
                    stream_addresses,
                    session_ids,
                },
                LedgerEvent::StreamCreated { stream_address, .. },
            ) => {
                session_ok(session_ids)
                    && (stream_addresses.is_empty() || stream_addresses.contains(stream_address))
            }
            (
                EventFilter::InputChunkAdded {
                    session_ids,
                    chunk_ids,
                },
                LedgerEvent::InputChunkAdded { chunk_id, .. },
            ) => session_ok(session_ids) && (chunk_ids.is_empty() || chunk_ids.contains(chunk_id)),
            _ => false,
        }
    }
}

/// Transaction submission and chain queries for the stream manager contract.
///
/// Implementations own transport, ABI encoding and signing. Methods that
/// submit transactions return the transaction hash without waiting for a
/// receipt; confirmation is observed through events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Address of the account that signs submitted transactions.
    fn signer_address(&self) -> Address;

    /// Submit the "request stream" transaction for `session_id`.
    async fn request_stream(&self, session_id: SessionId) -> Result<B256>;

    /// Submit the payable "create stream" transaction carrying `value`.
    async fn create_stream(&self, session_id: SessionId, value: U256) -> Result<B256>;

    /// Native balance of `address` in the smallest unit.
    async fn balance_of(&self, address: Address) -> Result<U256>;

    /// Logs matching `filter`, in ledger order.
    async fn query_events(&self, filter: &EventFilter) -> Result<Vec<LedgerEvent>>;
}

/// Produces a connected [`LedgerClient`], typically after unlocking a signer.
#[async_trait]
pub trait LedgerConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn LedgerClient>>;
}
