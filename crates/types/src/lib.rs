//! Shared types for the streamgate workspace.
//!
//! Everything that crosses a crate boundary lives here:
//! - [`SessionId`], the correlation key between ledger events and job records
//! - [`LedgerEvent`], the decoded stream-manager events
//! - [`Job`], the job-management service's record
//! - [`ErrorKind`], the error taxonomy every crate error maps onto

pub mod error;
pub mod event;
pub mod job;
pub mod session;

pub use error::ErrorKind;
pub use event::{EventKind, EventMeta, LedgerEvent};
pub use job::{Job, JobStatus};
pub use session::{ParseSessionIdError, SessionId};

/// Re-exported ledger primitives so downstream crates agree on one definition.
pub use alloy::primitives::{Address, B256, U256};
