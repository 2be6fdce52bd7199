//! Orchestrator settings.

use std::time::Duration;
use streamgate_ledger::EmitterConfig;
use streamgate_types::JobStatus;

pub const DEFAULT_MIN_BALANCE: u64 = 15;
pub const DEFAULT_APPROVED_STATUS: &str = "APPROVED";
pub const DEFAULT_READY_STATUS: &str = "READY";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Whole tokens the signer must hold before a session is requested.
    pub min_balance: u64,
    /// Job status that releases `create_session`.
    pub approved_status: JobStatus,
    /// Job status that means the output URL is live.
    pub ready_status: JobStatus,
    /// Ask the job service to stop the job when the session ends.
    pub cancel_job_on_exit: bool,
    pub emitter: EmitterConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            min_balance: DEFAULT_MIN_BALANCE,
            approved_status: JobStatus::from(DEFAULT_APPROVED_STATUS),
            ready_status: JobStatus::from(DEFAULT_READY_STATUS),
            cancel_job_on_exit: true,
            emitter: EmitterConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Shorten every ledger wait; used by tests and local setups.
    pub fn with_ledger_poll_interval(mut self, interval: Duration) -> Self {
        self.emitter.poll_interval = interval;
        self
    }
}
