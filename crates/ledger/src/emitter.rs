//! Ledger transactions that establish a session.

use crate::balance::{convert, Balance};
use crate::client::{EventFilter, LedgerClient};
use crate::error::{LedgerError, Result};
use crate::watcher::{EventWatcher, PendingEvent, DEFAULT_POLL_INTERVAL};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use streamgate_types::{Address, EventKind, SessionId, U256};
use tracing::{info, warn};

/// Value attached to `createStream`: 10 whole tokens.
pub const DEFAULT_CREATE_VALUE: u128 = 10_000_000_000_000_000_000;

/// Emitter tuning.
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    /// Bound for the detached observers started by `request_session`.
    pub observer_timeout: Duration,
    /// Bound for the `StreamCreated` confirmation.
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
    /// Amount, in the smallest unit, sent with `createStream`.
    pub create_value: U256,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            observer_timeout: Duration::from_secs(60),
            confirmation_timeout: Duration::from_secs(30),
            poll_interval: DEFAULT_POLL_INTERVAL,
            create_value: U256::from(DEFAULT_CREATE_VALUE),
        }
    }
}

/// Issues the request/create transaction pair for one session.
pub struct SessionEmitter {
    ledger: Arc<dyn LedgerClient>,
    watcher: EventWatcher,
    config: EmitterConfig,
}

impl SessionEmitter {
    pub fn new(ledger: Arc<dyn LedgerClient>, config: EmitterConfig) -> Self {
        let watcher = EventWatcher::with_poll_interval(ledger.clone(), config.poll_interval);
        Self {
            ledger,
            watcher,
            config,
        }
    }

    pub fn signer_address(&self) -> Address {
        self.ledger.signer_address()
    }

    /// Pick a fresh session id and submit the request transaction.
    ///
    /// The `StreamRequested` and `StreamApproved` observers started here only
    /// log what they see; approval is driven by the job service.
    pub async fn request_session(&self) -> Result<SessionId> {
        let session_id = SessionId::from_u64(rand::thread_rng().gen_range(0..i64::MAX as u64));
        let client = self.ledger.signer_address();

        let tx_hash = self.ledger.request_stream(session_id).await?;
        info!(%session_id, %tx_hash, "Submitted stream request");

        let requested = self.watcher.watch(
            EventFilter::stream_requested(client, session_id),
            self.config.observer_timeout,
        );
        let approved = self.watcher.watch(
            EventFilter::stream_approved(session_id),
            self.config.observer_timeout,
        );
        spawn_observer(session_id, requested);
        spawn_observer(session_id, approved);

        Ok(session_id)
    }

    /// Submit the payable create transaction and wait for the derived
    /// session contract to show up in a `StreamCreated` log.
    pub async fn create_session(&self, session_id: SessionId) -> Result<Address> {
        let tx_hash = self
            .ledger
            .create_stream(session_id, self.config.create_value)
            .await?;
        info!(%session_id, %tx_hash, value = %self.config.create_value, "Submitted stream creation");

        let event = self
            .watcher
            .watch(
                EventFilter::stream_created(session_id),
                self.config.confirmation_timeout,
            )
            .wait()
            .await?;

        let address = event.stream_address().ok_or_else(|| LedgerError::Decode {
            kind: EventKind::StreamCreated,
            reason: format!("matched {} without a stream address", event.kind()),
        })?;

        info!(%session_id, stream_address = %address, block = event.meta().block_number, "Stream created");
        Ok(address)
    }

    /// Balance of the signing account.
    pub async fn get_balance(&self) -> Result<Balance> {
        let raw = self.ledger.balance_of(self.signer_address()).await?;
        Ok(convert(raw))
    }
}

fn spawn_observer(session_id: SessionId, pending: PendingEvent) {
    let kind = pending.kind();
    tokio::spawn(async move {
        match pending.wait().await {
            Ok(event) => info!(%session_id, "Observed ledger event\n{}", event),
            Err(e) => warn!(%session_id, event = %kind, "Observer finished without event: {}", e),
        }
    });
}
