//! The session state machine.

use crate::config::OrchestratorConfig;
use crate::error::{Result, SessionError};
use crate::jobs::JobCoordinator;
use crate::progress::SessionProgress;
use std::future::Future;
use std::sync::Arc;
use streamgate_ledger::{LedgerConnector, SessionEmitter};
use streamgate_media::{probe_source, MediaConnector, MediaRelay, RelayEnd};
use streamgate_types::{Address, SessionId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// How a session that got as far as relaying came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The source ran dry.
    SourceExhausted,
    /// The shutdown signal fired.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub session_id: SessionId,
    pub contract: Address,
    pub destination: String,
    pub packets: u64,
    pub end: SessionEnd,
}

/// What setup hands over to the relay phase.
struct Setup {
    session_id: SessionId,
    contract: Address,
    destination: String,
}

/// Runs one session from source probe to relay shutdown.
pub struct SessionOrchestrator {
    config: OrchestratorConfig,
    ledger: Arc<dyn LedgerConnector>,
    media: Arc<dyn MediaConnector>,
    jobs: JobCoordinator,
    progress: Option<mpsc::UnboundedSender<SessionProgress>>,
}

impl SessionOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        ledger: Arc<dyn LedgerConnector>,
        media: Arc<dyn MediaConnector>,
        jobs: JobCoordinator,
    ) -> Self {
        Self {
            config,
            ledger,
            media,
            jobs,
            progress: None,
        }
    }

    /// Report progress through `tx`.
    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<SessionProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    fn report(&self, event: SessionProgress) {
        report(self.progress.as_ref(), event);
    }

    /// Run the session for `source`.
    ///
    /// Setup steps run in order and the first failure aborts the session.
    /// Once relaying, the session ends when the relay finishes or fails.
    /// `shutdown` is watched throughout: during setup it abandons the
    /// remaining steps, while relaying it stops the relay. Once a job exists
    /// it is cancelled on every exit path (when configured).
    pub async fn run<F>(&self, source: &str, shutdown: F) -> Result<SessionOutcome>
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        let mut job = None;

        let setup = tokio::select! {
            setup = self.setup(source, &mut job) => setup,
            _ = &mut shutdown => {
                info!("Shutdown requested during setup");
                self.report(SessionProgress::Stopping);
                Err(SessionError::Interrupted)
            }
        };
        let Setup {
            session_id,
            contract,
            destination,
        } = match setup {
            Ok(setup) => setup,
            Err(e) => {
                if let Some(session_id) = job {
                    self.cancel_job(session_id).await;
                }
                return Err(e);
            }
        };

        let relay = Arc::new(MediaRelay::new(self.media.clone(), source, destination.clone()));
        let relay_task = tokio::spawn({
            let relay = relay.clone();
            async move { relay.start().await }
        });
        self.report(SessionProgress::Relaying);

        let ready_task = self.spawn_ready_watch(session_id);

        let result = self.join_relay(&relay, relay_task, shutdown).await;

        ready_task.abort();
        self.cancel_job(session_id).await;

        let end = result?;
        Ok(SessionOutcome {
            session_id,
            contract,
            destination,
            packets: relay.packets_relayed(),
            end,
        })
    }

    /// Steps 1 to 8. `job` is filled in as soon as the job service has a job
    /// for this session.
    async fn setup(&self, source: &str, job: &mut Option<SessionId>) -> Result<Setup> {
        let streams = probe_source(self.media.as_ref(), source)
            .await
            .map_err(|e| SessionError::SourceProbe {
                address: source.to_string(),
                source: e,
            })?;
        info!(source, ?streams, "Probed source");
        self.report(SessionProgress::SourceProbed { streams });

        let ledger = self.ledger.connect().await.map_err(SessionError::LedgerConnect)?;
        let emitter = SessionEmitter::new(ledger, self.config.emitter.clone());
        let signer = emitter.signer_address();

        let balance = emitter.get_balance().await.map_err(SessionError::Balance)?;
        info!(%signer, %balance, "Account balance");
        if balance.is_below(self.config.min_balance) {
            return Err(SessionError::InsufficientBalance {
                balance: balance.to_string(),
                minimum: self.config.min_balance,
            });
        }
        self.report(SessionProgress::BalanceChecked { signer, balance });

        let session_id = emitter
            .request_session()
            .await
            .map_err(SessionError::RequestSession)?;
        info!(%session_id, "Acquired stream id");
        self.report(SessionProgress::SessionRequested { session_id });

        let destination = self
            .jobs
            .create_job(session_id, signer)
            .await
            .map_err(SessionError::CreateJob)?;
        *job = Some(session_id);
        info!(%session_id, %destination, "Acquired destination");
        self.report(SessionProgress::DestinationAcquired {
            destination: destination.clone(),
        });

        self.jobs
            .await_status(session_id, &self.config.approved_status)
            .await
            .map_err(SessionError::AwaitApproval)?;
        info!(%session_id, "Acquired approved job");
        self.report(SessionProgress::JobApproved);

        let contract = emitter
            .create_session(session_id)
            .await
            .map_err(SessionError::CreateSession)?;
        info!(%session_id, %contract, "Acquired stream address");
        self.report(SessionProgress::SessionCreated { contract });

        self.jobs
            .update_job_ledger_address(session_id, contract)
            .await
            .map_err(SessionError::UpdateJob)?;

        Ok(Setup {
            session_id,
            contract,
            destination,
        })
    }

    async fn cancel_job(&self, session_id: SessionId) {
        if !self.config.cancel_job_on_exit {
            return;
        }
        match self.jobs.cancel_job(session_id).await {
            Ok(()) => info!(%session_id, "Job cancelled"),
            Err(e) => warn!(%session_id, "Failed to cancel job: {}", e),
        }
    }

    fn spawn_ready_watch(&self, session_id: SessionId) -> JoinHandle<()> {
        let jobs = self.jobs.clone();
        let target = self.config.ready_status.clone();
        let progress = self.progress.clone();

        tokio::spawn(async move {
            match jobs.await_status(session_id, &target).await {
                Ok(job) => {
                    info!(%session_id, output_url = %job.output_url, "Job is ready");
                    report(progress.as_ref(), SessionProgress::Ready {
                        output_url: job.output_url,
                    });
                }
                Err(e) => error!(%session_id, "Failed to get ready job: {}", e),
            }
        })
    }

    async fn join_relay<F>(
        &self,
        relay: &MediaRelay,
        mut relay_task: JoinHandle<streamgate_media::MediaResult<streamgate_media::RelayOutcome>>,
        shutdown: F,
    ) -> Result<SessionEnd>
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);

        let (joined, cancelled) = tokio::select! {
            joined = &mut relay_task => (joined, false),
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping relay");
                self.report(SessionProgress::Stopping);
                relay.stop();
                (relay_task.await, true)
            }
        };

        match joined {
            Ok(Ok(outcome)) if cancelled || outcome.end == RelayEnd::Stopped => {
                Ok(SessionEnd::Cancelled)
            }
            Ok(Ok(_)) => Ok(SessionEnd::SourceExhausted),
            Ok(Err(e)) if cancelled => {
                warn!("Relay reported an error while stopping: {}", e);
                Ok(SessionEnd::Cancelled)
            }
            Ok(Err(e)) => Err(SessionError::Relay(e)),
            Err(e) => Err(SessionError::RelayTask(e.to_string())),
        }
    }
}

fn report(tx: Option<&mpsc::UnboundedSender<SessionProgress>>, event: SessionProgress) {
    if let Some(tx) = tx {
        // A caller that stopped listening does not affect the session.
        let _ = tx.send(event);
    }
}
