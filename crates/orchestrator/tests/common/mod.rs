//! Shared helpers for orchestrator integration tests.

#![allow(dead_code)]

pub mod fixtures;
pub mod mock_services;

pub use fixtures::*;
pub use mock_services::*;

use std::time::Duration;
use streamgate_orchestrator::{JobCoordinator, JobCoordinatorConfig, OrchestratorConfig};

/// Job client with intervals short enough for tests.
pub fn fast_jobs(base_url: &str) -> JobCoordinator {
    let mut config = JobCoordinatorConfig::new(base_url);
    config.poll_interval = Duration::from_millis(20);
    config.status_timeout = Duration::from_secs(2);
    JobCoordinator::new(config).unwrap()
}

pub fn fast_config() -> OrchestratorConfig {
    let mut config = OrchestratorConfig::default().with_ledger_poll_interval(Duration::from_millis(10));
    config.emitter.confirmation_timeout = Duration::from_millis(300);
    config.emitter.observer_timeout = Duration::from_millis(300);
    config
}
