//! Source-to-sink packet forwarding.

use crate::connector::MediaConnector;
use crate::endpoint::{MediaSink, MediaSource};
use crate::error::{MediaError, MediaResult};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle of a [`MediaRelay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    Opening,
    Relaying,
    Stopped,
    Failed,
}

impl RelayState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RelayState::Stopped | RelayState::Failed)
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelayState::Idle => "idle",
            RelayState::Opening => "opening",
            RelayState::Relaying => "relaying",
            RelayState::Stopped => "stopped",
            RelayState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why a relay ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    /// The source reported end of stream.
    SourceExhausted,
    /// `stop()` was called.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    pub packets: u64,
    pub end: RelayEnd,
}

/// Forwards one source to one destination.
///
/// `start` runs the whole transfer and is normally driven on its own task;
/// `stop` may be called from anywhere, any number of times.
pub struct MediaRelay {
    connector: Arc<dyn MediaConnector>,
    source: String,
    destination: String,
    cancel: CancellationToken,
    state: watch::Sender<RelayState>,
    packets: AtomicU64,
}

impl MediaRelay {
    pub fn new(
        connector: Arc<dyn MediaConnector>,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        let (state, _) = watch::channel(RelayState::Idle);
        Self {
            connector,
            source: source.into(),
            destination: destination.into(),
            cancel: CancellationToken::new(),
            state,
            packets: AtomicU64::new(0),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn state(&self) -> RelayState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<RelayState> {
        self.state.subscribe()
    }

    /// Packets forwarded so far.
    pub fn packets_relayed(&self) -> u64 {
        self.packets.load(Ordering::Relaxed)
    }

    /// Request the relay to close its handles and finish.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            debug!(source = %self.source, "Relay stop requested");
            self.cancel.cancel();
        }
    }

    /// Run the transfer to completion. Can only be called once.
    pub async fn start(&self) -> MediaResult<RelayOutcome> {
        let mut started = false;
        self.state.send_if_modified(|state| {
            if *state == RelayState::Idle {
                *state = RelayState::Opening;
                started = true;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(MediaError::AlreadyStarted);
        }

        let result = self.run().await;
        let final_state = match &result {
            Ok(_) => RelayState::Stopped,
            Err(_) => RelayState::Failed,
        };
        self.state.send_replace(final_state);

        match &result {
            Ok(outcome) => info!(
                source = %self.source,
                destination = %self.destination,
                packets = outcome.packets,
                end = ?outcome.end,
                "Relay finished"
            ),
            Err(e) => warn!(
                source = %self.source,
                destination = %self.destination,
                packets = self.packets_relayed(),
                "Relay failed: {}", e
            ),
        }
        result
    }

    async fn run(&self) -> MediaResult<RelayOutcome> {
        let stopped = || RelayOutcome {
            packets: self.packets_relayed(),
            end: RelayEnd::Stopped,
        };

        let mut source = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(stopped()),
            source = self.connector.open_source(&self.source) => source?,
        };

        let mut sink = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                close_source(source.as_mut()).await;
                return Ok(stopped());
            }
            sink = self.connector.dial_sink(&self.destination) => match sink {
                Ok(sink) => sink,
                Err(e) => {
                    close_source(source.as_mut()).await;
                    return Err(e);
                }
            },
        };

        let result = self.pump(source.as_mut(), sink.as_mut()).await;

        close_source(source.as_mut()).await;
        let closed = sink.close().await;

        match (result, closed) {
            (Err(e), _) => Err(e),
            (Ok(end), Ok(())) => Ok(RelayOutcome {
                packets: self.packets_relayed(),
                end,
            }),
            // Losing buffered output on a clean end is still a relay failure.
            (Ok(RelayEnd::SourceExhausted), Err(e)) => Err(e),
            (Ok(RelayEnd::Stopped), Err(e)) => {
                debug!("Ignoring sink close error after stop: {}", e);
                Ok(stopped())
            }
        }
    }

    async fn pump(&self, source: &mut dyn MediaSource, sink: &mut dyn MediaSink) -> MediaResult<RelayEnd> {
        let streams = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(RelayEnd::Stopped),
            streams = source.streams() => streams?,
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(RelayEnd::Stopped),
            written = sink.write_header(&streams) => written?,
        }

        self.state.send_replace(RelayState::Relaying);
        info!(
            source = %self.source,
            destination = %self.destination,
            streams = ?streams,
            "Relaying"
        );

        loop {
            let packet = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(RelayEnd::Stopped),
                packet = source.read_packet() => packet?,
            };

            let Some(packet) = packet else {
                return Ok(RelayEnd::SourceExhausted);
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(RelayEnd::Stopped),
                written = sink.write_packet(&packet) => written?,
            }
            self.packets.fetch_add(1, Ordering::Relaxed);
        }
    }
}

async fn close_source(source: &mut dyn MediaSource) {
    if let Err(e) = source.close().await {
        debug!("Failed to close media source: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{Packet, PacketKind, StreamDescriptor};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Written {
        Header(Vec<StreamDescriptor>),
        Packet(Packet),
        Closed,
    }

    #[derive(Default)]
    struct Journal {
        written: Mutex<Vec<Written>>,
        source_closed: Mutex<u32>,
        opened: Mutex<u32>,
    }

    enum Step {
        Packet(Packet),
        Fail,
        Hang,
    }

    struct FakeSource {
        steps: VecDeque<Step>,
        journal: Arc<Journal>,
    }

    #[async_trait]
    impl MediaSource for FakeSource {
        async fn streams(&mut self) -> MediaResult<Vec<StreamDescriptor>> {
            Ok(vec![StreamDescriptor::Audio, StreamDescriptor::Video])
        }

        async fn read_packet(&mut self) -> MediaResult<Option<Packet>> {
            match self.steps.pop_front() {
                Some(Step::Packet(p)) => Ok(Some(p)),
                Some(Step::Fail) => Err(MediaError::Io(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "reset",
                ))),
                Some(Step::Hang) => std::future::pending().await,
                None => Ok(None),
            }
        }

        async fn close(&mut self) -> MediaResult<()> {
            *self.journal.source_closed.lock().unwrap() += 1;
            Ok(())
        }
    }

    struct FakeSink {
        journal: Arc<Journal>,
    }

    #[async_trait]
    impl MediaSink for FakeSink {
        async fn write_header(&mut self, streams: &[StreamDescriptor]) -> MediaResult<()> {
            self.journal.written.lock().unwrap().push(Written::Header(streams.to_vec()));
            Ok(())
        }

        async fn write_packet(&mut self, packet: &Packet) -> MediaResult<()> {
            self.journal.written.lock().unwrap().push(Written::Packet(packet.clone()));
            Ok(())
        }

        async fn close(&mut self) -> MediaResult<()> {
            self.journal.written.lock().unwrap().push(Written::Closed);
            Ok(())
        }
    }

    struct FakeConnector {
        steps: Mutex<Option<Vec<Step>>>,
        journal: Arc<Journal>,
        fail_dial: bool,
    }

    impl FakeConnector {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(Some(steps)),
                journal: Arc::new(Journal::default()),
                fail_dial: false,
            }
        }
    }

    #[async_trait]
    impl MediaConnector for FakeConnector {
        async fn open_source(&self, _address: &str) -> MediaResult<Box<dyn MediaSource>> {
            *self.journal.opened.lock().unwrap() += 1;
            let steps = self.steps.lock().unwrap().take().unwrap_or_default();
            Ok(Box::new(FakeSource {
                steps: steps.into(),
                journal: self.journal.clone(),
            }))
        }

        async fn dial_sink(&self, address: &str) -> MediaResult<Box<dyn MediaSink>> {
            if self.fail_dial {
                return Err(MediaError::ConnectFailed {
                    address: address.to_string(),
                    source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
                });
            }
            Ok(Box::new(FakeSink {
                journal: self.journal.clone(),
            }))
        }
    }

    fn packets(n: u32) -> Vec<Packet> {
        (0..n)
            .map(|i| Packet::new(PacketKind::Video, i * 40, vec![i as u8; 4]))
            .collect()
    }

    #[tokio::test]
    async fn test_relays_all_packets_after_one_header() {
        let connector = Arc::new(FakeConnector::new(
            packets(5).into_iter().map(Step::Packet).collect(),
        ));
        let journal = connector.journal.clone();
        let relay = MediaRelay::new(connector, "src", "dst");

        let outcome = relay.start().await.unwrap();
        assert_eq!(outcome, RelayOutcome { packets: 5, end: RelayEnd::SourceExhausted });
        assert_eq!(relay.state(), RelayState::Stopped);

        let mut expected = vec![Written::Header(vec![StreamDescriptor::Audio, StreamDescriptor::Video])];
        expected.extend(packets(5).into_iter().map(Written::Packet));
        expected.push(Written::Closed);
        assert_eq!(*journal.written.lock().unwrap(), expected);
        assert_eq!(*journal.source_closed.lock().unwrap(), 1);

        relay.stop();
        relay.stop();
        assert_eq!(relay.state(), RelayState::Stopped);
        assert_eq!(journal.written.lock().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_read_failure_fails_relay_and_closes_handles() {
        let mut steps: Vec<Step> = packets(2).into_iter().map(Step::Packet).collect();
        steps.push(Step::Fail);
        let connector = Arc::new(FakeConnector::new(steps));
        let journal = connector.journal.clone();
        let relay = MediaRelay::new(connector, "src", "dst");

        let err = relay.start().await.unwrap_err();
        assert!(matches!(err, MediaError::Io(_)));
        assert_eq!(relay.state(), RelayState::Failed);
        assert_eq!(relay.packets_relayed(), 2);
        assert_eq!(*journal.source_closed.lock().unwrap(), 1);
        assert_eq!(journal.written.lock().unwrap().last(), Some(&Written::Closed));
    }

    #[tokio::test]
    async fn test_stop_before_start_opens_nothing() {
        let connector = Arc::new(FakeConnector::new(Vec::new()));
        let journal = connector.journal.clone();
        let relay = MediaRelay::new(connector, "src", "dst");

        relay.stop();
        let outcome = relay.start().await.unwrap();

        assert_eq!(outcome.end, RelayEnd::Stopped);
        assert_eq!(*journal.opened.lock().unwrap(), 0);
        assert_eq!(relay.state(), RelayState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_while_relaying() {
        let mut steps: Vec<Step> = packets(3).into_iter().map(Step::Packet).collect();
        steps.push(Step::Hang);
        let connector = Arc::new(FakeConnector::new(steps));
        let journal = connector.journal.clone();
        let relay = Arc::new(MediaRelay::new(connector, "src", "dst"));

        let mut state = relay.subscribe();
        let task = tokio::spawn({
            let relay = relay.clone();
            async move { relay.start().await }
        });

        state.wait_for(|s| *s == RelayState::Relaying).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), async {
            while relay.packets_relayed() < 3 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        relay.stop();
        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, RelayOutcome { packets: 3, end: RelayEnd::Stopped });
        assert_eq!(*journal.source_closed.lock().unwrap(), 1);
        assert_eq!(journal.written.lock().unwrap().last(), Some(&Written::Closed));
    }

    #[tokio::test]
    async fn test_dial_failure_closes_source() {
        let mut connector = FakeConnector::new(packets(1).into_iter().map(Step::Packet).collect());
        connector.fail_dial = true;
        let journal = connector.journal.clone();
        let relay = MediaRelay::new(Arc::new(connector), "src", "dst");

        let err = relay.start().await.unwrap_err();
        assert!(matches!(err, MediaError::ConnectFailed { .. }));
        assert_eq!(*journal.source_closed.lock().unwrap(), 1);
        assert!(journal.written.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let relay = MediaRelay::new(Arc::new(FakeConnector::new(Vec::new())), "src", "dst");
        relay.start().await.unwrap();
        assert!(matches!(relay.start().await, Err(MediaError::AlreadyStarted)));
    }
}
