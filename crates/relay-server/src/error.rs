//! Relay server errors.

use std::io;
use streamgate_media::MediaError;
use streamgate_types::ErrorKind;
use thiserror::Error;

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("stream '{key}' already has a publisher")]
    AlreadyPublishing { key: String },

    #[error("stream '{key}' was not found")]
    NotFound { key: String },
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::AlreadyPublishing { .. } | RegistryError::NotFound { .. } => {
                ErrorKind::Validation
            }
        }
    }
}

/// Failure while serving one connection.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("client did not complete the handshake within {timeout_secs}s")]
    HandshakeTimeout { timeout_secs: u64 },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ServerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServerError::HandshakeTimeout { .. } => ErrorKind::Timeout,
            ServerError::Registry(e) => e.kind(),
            ServerError::Media(e) => e.kind(),
            ServerError::Io(_) => ErrorKind::Transport,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = RegistryError::NotFound { key: "live".into() };
        assert_eq!(err.to_string(), "stream 'live' was not found");
        assert_eq!(ServerError::from(err).kind(), ErrorKind::Validation);

        let err = ServerError::HandshakeTimeout { timeout_secs: 5 };
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(
            ServerError::from(MediaError::Format("bad".into())).kind(),
            ErrorKind::Protocol
        );
    }
}
