//! Session orchestration.
//!
//! [`SessionOrchestrator`] sequences one streaming session:
//!
//! 1. probe the source
//! 2. connect the ledger and check the signer's balance
//! 3. request a session on the ledger
//! 4. create a job and wait for it to be approved
//! 5. create the session contract and publish its address to the job
//! 6. relay media until the source ends, the relay fails or shutdown is requested,
//!    while a background poll reports when the job output is ready
//!
//! ## Usage
//!
//! ```rust,ignore
//! let jobs = JobCoordinator::new(JobCoordinatorConfig::new(manager_url))?;
//! let orchestrator = SessionOrchestrator::new(config, ledger_connector, media_connector, jobs)
//!     .with_progress(progress_tx);
//!
//! let outcome = orchestrator.run("tcp://camera:1936/live", shutdown_signal()).await?;
//! ```

pub mod config;
pub mod error;
pub mod jobs;
pub mod progress;
pub mod session;

pub use config::OrchestratorConfig;
pub use error::{Result, SessionError};
pub use jobs::{JobCoordinator, JobCoordinatorConfig, JobError, JobResult};
pub use progress::SessionProgress;
pub use session::{SessionEnd, SessionOrchestrator, SessionOutcome};
