//! Session error types.

use crate::jobs::JobError;
use streamgate_ledger::LedgerError;
use streamgate_media::MediaError;
use streamgate_types::ErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

/// Failure of one orchestration step.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to probe source {address}: {source}")]
    SourceProbe {
        address: String,
        #[source]
        source: MediaError,
    },

    #[error("failed to connect to ledger: {0}")]
    LedgerConnect(#[source] LedgerError),

    #[error("failed to get account balance: {0}")]
    Balance(#[source] LedgerError),

    #[error("insufficient account balance {balance}, must be minimum {minimum} available")]
    InsufficientBalance { balance: String, minimum: u64 },

    #[error("failed to request stream: {0}")]
    RequestSession(#[source] LedgerError),

    #[error("failed to create job: {0}")]
    CreateJob(#[source] JobError),

    #[error("failed to get approved job: {0}")]
    AwaitApproval(#[source] JobError),

    #[error("failed to create stream: {0}")]
    CreateSession(#[source] LedgerError),

    #[error("failed to update job: {0}")]
    UpdateJob(#[source] JobError),

    #[error("relay failed: {0}")]
    Relay(#[source] MediaError),

    #[error("relay task ended abnormally: {0}")]
    RelayTask(String),

    #[error("session interrupted before streaming started")]
    Interrupted,
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::SourceProbe { .. } | SessionError::InsufficientBalance { .. } => {
                ErrorKind::Validation
            }
            SessionError::LedgerConnect(e)
            | SessionError::Balance(e)
            | SessionError::RequestSession(e)
            | SessionError::CreateSession(e) => e.kind(),
            SessionError::CreateJob(e) | SessionError::AwaitApproval(e) | SessionError::UpdateJob(e) => {
                e.kind()
            }
            SessionError::Relay(e) => e.kind(),
            SessionError::RelayTask(_) => ErrorKind::Relay,
            SessionError::Interrupted => ErrorKind::Cancelled,
        }
    }
}
