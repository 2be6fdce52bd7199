//! Bounded polling for ledger events.
//!
//! A watch queries the ledger for logs matching an [`EventFilter`] every
//! poll interval until the first match appears or the timeout elapses. The
//! outcome (event or error) is delivered once through a single oneshot slot.
//! Logs returned by the ledger are checked against the filter again, so a
//! client that filters loosely never produces a wrong match.

use crate::client::{EventFilter, LedgerClient};
use crate::error::{LedgerError, Result};
use std::sync::Arc;
use std::time::Duration;
use streamgate_types::{EventKind, LedgerEvent};
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::{debug, warn};

/// Delay between two log queries of the same watch.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Spawns one polling task per watch.
#[derive(Clone)]
pub struct EventWatcher {
    ledger: Arc<dyn LedgerClient>,
    poll_interval: Duration,
}

impl EventWatcher {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self::with_poll_interval(ledger, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(ledger: Arc<dyn LedgerClient>, poll_interval: Duration) -> Self {
        Self {
            ledger,
            poll_interval,
        }
    }

    /// Start watching for the first event matching `filter`.
    ///
    /// Returns immediately; polling happens on a background task. Dropping
    /// the returned [`PendingEvent`] stops that task at its next suspension
    /// point.
    pub fn watch(&self, filter: EventFilter, timeout: Duration) -> PendingEvent {
        let (mut tx, rx) = oneshot::channel();
        let kind = filter.kind();
        let ledger = self.ledger.clone();
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = tx.closed() => {
                    debug!(event = %kind, "Watch abandoned by its consumer");
                    return;
                }
                outcome = poll_until_match(ledger.as_ref(), &filter, poll_interval, timeout) => outcome,
            };

            // Receiver may have gone away in the meantime; nothing left to do then.
            let _ = tx.send(outcome);
        });

        PendingEvent { kind, rx }
    }
}

async fn poll_until_match(
    ledger: &dyn LedgerClient,
    filter: &EventFilter,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<LedgerEvent> {
    let kind = filter.kind();
    let mut last_error: Option<String> = None;

    let search = async {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            match ledger.query_events(filter).await {
                Ok(events) => {
                    if let Some(event) = events.into_iter().find(|e| filter.matches(e)) {
                        debug!(event = %kind, attempt, "Matched ledger event");
                        return event;
                    }
                    debug!(event = %kind, attempt, "No matching logs yet");
                }
                Err(e) => {
                    warn!(event = %kind, attempt, "Failed to query {} logs: {}", kind, e);
                    last_error = Some(e.to_string());
                }
            }

            tokio::time::sleep(poll_interval).await;
        }
    };

    let matched = tokio::time::timeout(timeout, search).await;

    match matched {
        Ok(event) => Ok(event),
        Err(_) => Err(LedgerError::WatchTimeout {
            kind,
            timeout_secs: timeout.as_secs(),
            last_error,
        }),
    }
}

/// Non-blocking view of a watch.
#[derive(Debug)]
pub enum WatchState {
    Pending,
    Matched(LedgerEvent),
    Failed(LedgerError),
}

/// Handle to a running watch; resolves exactly once.
#[derive(Debug)]
pub struct PendingEvent {
    kind: EventKind,
    rx: oneshot::Receiver<Result<LedgerEvent>>,
}

impl PendingEvent {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Wait for the watch to finish.
    pub async fn wait(self) -> Result<LedgerEvent> {
        let kind = self.kind;
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(LedgerError::WatchAborted(kind)),
        }
    }

    /// Check for a result without waiting. A result is handed out once;
    /// later calls report the watch as aborted.
    pub fn state(&mut self) -> WatchState {
        match self.rx.try_recv() {
            Ok(Ok(event)) => WatchState::Matched(event),
            Ok(Err(e)) => WatchState::Failed(e),
            Err(TryRecvError::Empty) => WatchState::Pending,
            Err(TryRecvError::Closed) => WatchState::Failed(LedgerError::WatchAborted(self.kind)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockLedgerClient;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use streamgate_types::{Address, EventMeta, SessionId, B256};

    fn approved(id: u64, block: u64) -> LedgerEvent {
        LedgerEvent::StreamApproved(EventMeta {
            address: Address::repeat_byte(0xaa),
            session_id: SessionId::from_u64(id),
            block_number: block,
            block_hash: B256::repeat_byte(block as u8),
            tx_hash: B256::repeat_byte(0x01),
            tx_index: 3,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_times_out_without_match() {
        let mut ledger = MockLedgerClient::new();
        ledger.expect_query_events().returning(|_| Ok(Vec::new()));

        let watcher = EventWatcher::new(Arc::new(ledger));
        let pending = watcher.watch(
            EventFilter::stream_approved(SessionId::from_u64(1)),
            Duration::from_secs(30),
        );

        let err = pending.wait().await.unwrap_err();
        assert!(err.is_timeout());
        assert!(matches!(
            err,
            LedgerError::WatchTimeout { kind: EventKind::StreamApproved, timeout_secs: 30, last_error: None }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_match_published_and_polling_stops() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut ledger = MockLedgerClient::new();
        ledger.expect_query_events().returning(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Ok(Vec::new())
            } else {
                Ok(vec![approved(9, 100), approved(9, 101)])
            }
        });

        let watcher = EventWatcher::new(Arc::new(ledger));
        let event = watcher
            .watch(
                EventFilter::stream_approved(SessionId::from_u64(9)),
                Duration::from_secs(60),
            )
            .wait()
            .await
            .unwrap();

        assert_eq!(event, approved(9, 100));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // Well past several poll intervals: no further queries.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logs_outside_the_filter_are_skipped() {
        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_query_events()
            .returning(|_| Ok(vec![approved(8, 50), approved(5, 51), approved(5, 52)]));

        let watcher = EventWatcher::new(Arc::new(ledger));
        let event = watcher
            .watch(
                EventFilter::stream_approved(SessionId::from_u64(5)),
                Duration::from_secs(60),
            )
            .wait()
            .await
            .unwrap();

        assert_eq!(event, approved(5, 51));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrelated_logs_never_match() {
        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_query_events()
            .returning(|_| Ok(vec![approved(8, 50)]));

        let watcher = EventWatcher::new(Arc::new(ledger));
        let err = watcher
            .watch(
                EventFilter::stream_approved(SessionId::from_u64(5)),
                Duration::from_secs(20),
            )
            .wait()
            .await
            .unwrap_err();

        assert!(err.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_errors_are_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut ledger = MockLedgerClient::new();
        ledger.expect_query_events().returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(LedgerError::Rpc("connection reset".to_string()))
            } else {
                Ok(vec![approved(4, 7)])
            }
        });

        let watcher = EventWatcher::new(Arc::new(ledger));
        let event = watcher
            .watch(
                EventFilter::stream_approved(SessionId::from_u64(4)),
                Duration::from_secs(60),
            )
            .wait()
            .await
            .unwrap();

        assert_eq!(event.session_id(), SessionId::from_u64(4));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_last_query_error() {
        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_query_events()
            .returning(|_| Err(LedgerError::Rpc("node unavailable".to_string())));

        let watcher = EventWatcher::with_poll_interval(Arc::new(ledger), Duration::from_secs(1));
        let err = watcher
            .watch(
                EventFilter::stream_created(SessionId::from_u64(2)),
                Duration::from_secs(5),
            )
            .wait()
            .await
            .unwrap_err();

        assert!(err.to_string().contains("node unavailable"), "{}", err);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_is_pending_then_matched() {
        let mut ledger = MockLedgerClient::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        ledger.expect_query_events().returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(Vec::new())
            } else {
                Ok(vec![approved(1, 1)])
            }
        });

        let watcher = EventWatcher::new(Arc::new(ledger));
        let mut pending = watcher.watch(
            EventFilter::stream_approved(SessionId::from_u64(1)),
            Duration::from_secs(60),
        );

        tokio::task::yield_now().await;
        assert!(matches!(pending.state(), WatchState::Pending));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(matches!(pending.state(), WatchState::Matched(_)));
    }
}
