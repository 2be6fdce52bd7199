//! Ledger side of a streaming session.
//!
//! This crate provides:
//! - [`LedgerClient`]: the capability the orchestration core consumes
//!   (transaction submission, log filtering, balances)
//! - [`EventWatcher`]: bounded polling for the first log matching a filter
//! - [`SessionEmitter`]: the request/create transaction pair that establishes a session
//! - [`balance`]: exact conversion of native amounts into whole-token balances
//! - [`EthereumLedger`]: the alloy-backed client for the stream manager contract
//!
//! ## Usage
//!
//! ```rust,ignore
//! let signer = load_signer(&keystore_path, &password)?;
//! let ledger = Arc::new(EthereumLedger::connect(&config, signer)?);
//! let emitter = SessionEmitter::new(ledger, EmitterConfig::default());
//!
//! let session_id = emitter.request_session().await?;
//! // ... job service approves the session ...
//! let contract = emitter.create_session(session_id).await?;
//! ```

pub mod balance;
pub mod client;
pub mod emitter;
pub mod error;
pub mod ethereum;
pub mod keystore;
pub mod watcher;

pub use balance::{convert, Balance};
pub use client::{EventFilter, LedgerClient, LedgerConnector};
pub use emitter::{EmitterConfig, SessionEmitter};
pub use error::{LedgerError, Result};
pub use ethereum::{EthereumLedger, EthereumLedgerConfig, KeystoreConnector};
pub use keystore::load_signer;
pub use watcher::{EventWatcher, PendingEvent, WatchState, DEFAULT_POLL_INTERVAL};

#[cfg(test)]
pub use client::MockLedgerClient;
