//! Media error types.

use std::io;
use streamgate_types::ErrorKind;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = std::result::Result<T, MediaError>;

/// Errors raised while opening, reading or writing media endpoints.
#[derive(Debug, Error)]
pub enum MediaError {
    /// Address could not be parsed or uses an unknown scheme.
    #[error("invalid media address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Endpoint could not be reached.
    #[error("failed to connect to {address}: {source}")]
    ConnectFailed {
        address: String,
        #[source]
        source: io::Error,
    },

    /// Connecting did not complete in time.
    #[error("timed out connecting to {address}")]
    ConnectTimeout { address: String },

    /// Remote side refused the publish/play request.
    #[error("handshake with {address} failed: {reason}")]
    Handshake { address: String, reason: String },

    /// Malformed container data.
    #[error("malformed stream: {0}")]
    Format(String),

    /// Read or write failure on an open handle.
    #[error("media I/O error: {0}")]
    Io(#[from] io::Error),

    /// Operation on a handle that has already been closed.
    #[error("media handle already closed")]
    Closed,

    /// `start` called on a relay that is not idle.
    #[error("relay already started")]
    AlreadyStarted,
}

impl MediaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MediaError::InvalidAddress { .. } => ErrorKind::Validation,
            MediaError::ConnectFailed { .. } => ErrorKind::Transport,
            MediaError::ConnectTimeout { .. } => ErrorKind::Timeout,
            MediaError::Handshake { .. } | MediaError::Format(_) => ErrorKind::Protocol,
            MediaError::Io(_) | MediaError::Closed | MediaError::AlreadyStarted => ErrorKind::Relay,
        }
    }

    pub(crate) fn invalid_address(address: &str, reason: impl Into<String>) -> Self {
        MediaError::InvalidAddress {
            address: address.to_string(),
            reason: reason.into(),
        }
    }
}
