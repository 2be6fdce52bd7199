//! In-memory ledger and media collaborators.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use streamgate_ledger::{EventFilter, LedgerClient, LedgerConnector, LedgerError};
use streamgate_media::{
    MediaConnector, MediaError, MediaResult, MediaSink, MediaSource, Packet, PacketKind,
    StreamDescriptor,
};
use streamgate_types::{Address, EventMeta, LedgerEvent, SessionId, B256, U256};

pub const WEI: u128 = 1_000_000_000_000_000_000;

pub fn signer() -> Address {
    Address::repeat_byte(0x5a)
}

pub fn session_contract() -> Address {
    Address::repeat_byte(0xc0)
}

/// Ledger that confirms every created session immediately.
pub struct FakeLedger {
    balance: U256,
    confirm_creation: bool,
    requested: Mutex<Vec<SessionId>>,
    created: Mutex<Vec<(SessionId, U256)>>,
    submissions: AtomicUsize,
}

impl FakeLedger {
    pub fn with_balance(whole_tokens: u128) -> Arc<Self> {
        Arc::new(Self {
            balance: U256::from(whole_tokens * WEI),
            confirm_creation: true,
            requested: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            submissions: AtomicUsize::new(0),
        })
    }

    pub fn never_confirming(whole_tokens: u128) -> Arc<Self> {
        Arc::new(Self {
            balance: U256::from(whole_tokens * WEI),
            confirm_creation: false,
            requested: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            submissions: AtomicUsize::new(0),
        })
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<SessionId> {
        self.requested.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<(SessionId, U256)> {
        self.created.lock().unwrap().clone()
    }
}

fn meta(session_id: SessionId) -> EventMeta {
    EventMeta {
        address: Address::repeat_byte(0x01),
        session_id,
        block_number: 100,
        block_hash: B256::repeat_byte(0x02),
        tx_hash: B256::repeat_byte(0x03),
        tx_index: 0,
    }
}

#[async_trait]
impl LedgerClient for FakeLedger {
    fn signer_address(&self) -> Address {
        signer()
    }

    async fn request_stream(&self, session_id: SessionId) -> Result<B256, LedgerError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(session_id);
        Ok(B256::repeat_byte(0x10))
    }

    async fn create_stream(&self, session_id: SessionId, value: U256) -> Result<B256, LedgerError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        self.created.lock().unwrap().push((session_id, value));
        Ok(B256::repeat_byte(0x11))
    }

    async fn balance_of(&self, _address: Address) -> Result<U256, LedgerError> {
        Ok(self.balance)
    }

    async fn query_events(&self, filter: &EventFilter) -> Result<Vec<LedgerEvent>, LedgerError> {
        let created = self.created.lock().unwrap().clone();
        let events = match filter {
            EventFilter::StreamCreated { .. } if self.confirm_creation => created
                .iter()
                .map(|(id, _)| LedgerEvent::StreamCreated {
                    meta: meta(*id),
                    stream_address: session_contract(),
                })
                .filter(|e| filter.matches(e))
                .collect(),
            _ => Vec::new(),
        };
        Ok(events)
    }
}

pub struct FakeLedgerConnector {
    ledger: Arc<FakeLedger>,
}

impl FakeLedgerConnector {
    pub fn new(ledger: Arc<FakeLedger>) -> Arc<Self> {
        Arc::new(Self { ledger })
    }
}

#[async_trait]
impl LedgerConnector for FakeLedgerConnector {
    async fn connect(&self) -> Result<Arc<dyn LedgerClient>, LedgerError> {
        Ok(self.ledger.clone())
    }
}

pub fn packets(n: u32) -> Vec<Packet> {
    (0..n)
        .map(|i| Packet::new(PacketKind::Video, i * 33, vec![i as u8; 8]))
        .collect()
}

/// What a memory source does once its packets are used up.
#[derive(Clone, Copy)]
enum SourceEnd {
    Eof,
    Hang,
    Reset,
}

/// Media endpoints backed by memory. Sources yield the configured packets
/// and then end, block forever or fail.
pub struct FakeMedia {
    packets: Vec<Packet>,
    source_end: SourceEnd,
    reachable: bool,
    pub written: Arc<Mutex<Vec<Packet>>>,
    pub headers: Arc<AtomicUsize>,
    pub dialed: Arc<Mutex<Vec<String>>>,
}

impl FakeMedia {
    pub fn finite(packets: Vec<Packet>) -> Arc<Self> {
        Arc::new(Self::build(packets, SourceEnd::Eof, true))
    }

    pub fn live(packets: Vec<Packet>) -> Arc<Self> {
        Arc::new(Self::build(packets, SourceEnd::Hang, true))
    }

    /// Source that delivers `n` packets and then reports a connection reset.
    pub fn failing_after(n: u32) -> Arc<Self> {
        Arc::new(Self::build(packets(n), SourceEnd::Reset, true))
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self::build(Vec::new(), SourceEnd::Eof, false))
    }

    fn build(packets: Vec<Packet>, source_end: SourceEnd, reachable: bool) -> Self {
        Self {
            packets,
            source_end,
            reachable,
            written: Arc::new(Mutex::new(Vec::new())),
            headers: Arc::new(AtomicUsize::new(0)),
            dialed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn written(&self) -> Vec<Packet> {
        self.written.lock().unwrap().clone()
    }
}

struct MemorySource {
    packets: VecDeque<Packet>,
    end: SourceEnd,
}

#[async_trait]
impl MediaSource for MemorySource {
    async fn streams(&mut self) -> MediaResult<Vec<StreamDescriptor>> {
        Ok(vec![StreamDescriptor::Audio, StreamDescriptor::Video])
    }

    async fn read_packet(&mut self) -> MediaResult<Option<Packet>> {
        if let Some(p) = self.packets.pop_front() {
            return Ok(Some(p));
        }
        match self.end {
            SourceEnd::Eof => Ok(None),
            SourceEnd::Hang => std::future::pending().await,
            SourceEnd::Reset => Err(MediaError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "source reset",
            ))),
        }
    }

    async fn close(&mut self) -> MediaResult<()> {
        Ok(())
    }
}

struct MemorySink {
    written: Arc<Mutex<Vec<Packet>>>,
    headers: Arc<AtomicUsize>,
}

#[async_trait]
impl MediaSink for MemorySink {
    async fn write_header(&mut self, _streams: &[StreamDescriptor]) -> MediaResult<()> {
        self.headers.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn write_packet(&mut self, packet: &Packet) -> MediaResult<()> {
        self.written.lock().unwrap().push(packet.clone());
        Ok(())
    }

    async fn close(&mut self) -> MediaResult<()> {
        Ok(())
    }
}

#[async_trait]
impl MediaConnector for FakeMedia {
    async fn open_source(&self, address: &str) -> MediaResult<Box<dyn MediaSource>> {
        if !self.reachable {
            return Err(MediaError::ConnectFailed {
                address: address.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
            });
        }
        Ok(Box::new(MemorySource {
            packets: self.packets.clone().into(),
            end: self.source_end,
        }))
    }

    async fn dial_sink(&self, address: &str) -> MediaResult<Box<dyn MediaSink>> {
        self.dialed.lock().unwrap().push(address.to_string());
        Ok(Box::new(MemorySink {
            written: self.written.clone(),
            headers: self.headers.clone(),
        }))
    }
}
