//! Ledger error types.

use streamgate_types::{ErrorKind, EventKind};
use thiserror::Error;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur while talking to the ledger.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// RPC call failed (connection refused, node error, ...).
    #[error("ledger RPC error: {0}")]
    Rpc(String),

    /// A transaction could not be submitted.
    #[error("transaction submission failed: {0}")]
    Submission(String),

    /// A log matched the filter but could not be decoded.
    #[error("failed to decode {kind} log: {reason}")]
    Decode { kind: EventKind, reason: String },

    /// No matching event within the watch timeout.
    #[error(
        "timed out after {timeout_secs}s waiting for {kind} event{}",
        last_error_suffix(.last_error)
    )]
    WatchTimeout {
        kind: EventKind,
        timeout_secs: u64,
        /// Last log query failure seen while polling, if any.
        last_error: Option<String>,
    },

    /// The watch task went away without publishing a result.
    #[error("watch for {0} event ended without a result")]
    WatchAborted(EventKind),

    /// Keystore could not be read or decrypted.
    #[error("keystore error: {0}")]
    Keystore(String),

    /// Invalid RPC URL, contract address or similar.
    #[error("invalid ledger configuration: {0}")]
    Config(String),
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    match last_error {
        Some(e) => format!(" (last query error: {})", e),
        None => String::new(),
    }
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Rpc(_) | LedgerError::Submission(_) | LedgerError::WatchAborted(_) => {
                ErrorKind::Transport
            }
            LedgerError::Decode { .. } => ErrorKind::Protocol,
            LedgerError::WatchTimeout { .. } => ErrorKind::Timeout,
            LedgerError::Keystore(_) | LedgerError::Config(_) => ErrorKind::Validation,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, LedgerError::WatchTimeout { .. })
    }
}
