//! Error taxonomy shared by every crate in the workspace.

use serde::{Deserialize, Serialize};

/// Coarse classification of a failure.
///
/// Each crate keeps its own `thiserror` enum; `kind()` on those enums maps
/// them onto this set so callers can react without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network or I/O failure reaching the ledger, the job service or a media endpoint.
    Transport,
    /// Non-success status code or a malformed response body.
    Protocol,
    /// A bounded wait elapsed without its condition being met.
    Timeout,
    /// Input rejected before any side effect (insufficient balance, unreachable source).
    Validation,
    /// Media read/write failure other than a clean end of stream.
    Relay,
    /// The caller's shutdown signal ended the work before it completed.
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Transport => "transport_error",
            Self::Protocol => "protocol_error",
            Self::Timeout => "timeout_error",
            Self::Validation => "validation_error",
            Self::Relay => "relay_error",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}
