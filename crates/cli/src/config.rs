//! Configuration for the streamgate CLI.
//!
//! Values come from built-in defaults, then `~/.streamgate/config.toml` when it
//! exists, then `STREAMGATE_*` environment variables.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use streamgate_ledger::{EmitterConfig, EthereumLedgerConfig};
use streamgate_orchestrator::{JobCoordinatorConfig, OrchestratorConfig};
use streamgate_types::{Address, JobStatus};

pub const ENV_PREFIX: &str = "STREAMGATE";

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Job manager base URL
    pub manager_addr: String,

    /// Ledger node JSON-RPC URL
    pub node_rpc_addr: String,

    /// Stream manager contract address
    pub contract_address: String,

    /// Whole tokens required before a stream is requested
    pub min_balance: u64,

    pub log_level: String,

    /// Log format (text, json)
    pub log_format: String,

    pub colored: bool,

    /// Client name recorded with each stream request
    pub client_tag: String,

    /// Transcoding profiles requested on the ledger
    pub profiles: Vec<u64>,

    /// Profile sent to the job manager
    pub profile_id: u64,

    pub approved_status: String,
    pub ready_status: String,

    /// Stop the job when streaming ends
    pub cancel_job_on_stop: bool,

    pub ledger_poll_interval_secs: u64,
    pub observer_timeout_secs: u64,
    pub confirmation_timeout_secs: u64,

    pub job_request_timeout_secs: u64,
    pub job_poll_interval_secs: u64,
    pub job_status_timeout_secs: u64,

    /// Timeout for opening TCP media endpoints
    pub connect_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manager_addr: String::new(),
            node_rpc_addr: String::new(),
            contract_address: String::new(),
            min_balance: 15,
            log_level: "error".to_string(),
            log_format: "text".to_string(),
            colored: true,
            client_tag: "streamgate".to_string(),
            profiles: vec![0, 1, 2],
            profile_id: 1,
            approved_status: "APPROVED".to_string(),
            ready_status: "READY".to_string(),
            cancel_job_on_stop: true,
            ledger_poll_interval_secs: 5,
            observer_timeout_secs: 60,
            confirmation_timeout_secs: 30,
            job_request_timeout_secs: 5,
            job_poll_interval_secs: 5,
            job_status_timeout_secs: 60,
            connect_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Could not determine home directory")?;

        Ok(home_dir.join(".streamgate").join("config.toml"))
    }

    /// Load from the default file location and the process environment.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(Some(&path), ENV_PREFIX)
    }

    /// Load from an optional file and environment variables under `env_prefix`.
    ///
    /// A missing file is not an error.
    pub fn load_from(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(false));
        }

        let settings = builder
            .add_source(::config::Environment::with_prefix(env_prefix).try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Check everything `start` needs before any network traffic happens.
    pub fn validate(&self) -> Result<()> {
        if self.manager_addr.trim().is_empty() {
            bail!("manager_addr is not set (STREAMGATE_MANAGER_ADDR)");
        }
        if self.node_rpc_addr.trim().is_empty() {
            bail!("node_rpc_addr is not set (STREAMGATE_NODE_RPC_ADDR)");
        }
        if self.contract_address.trim().is_empty() {
            bail!("contract_address is not set (STREAMGATE_CONTRACT_ADDRESS)");
        }
        self.contract()?;

        if self.log_format != "text" && self.log_format != "json" {
            bail!("Invalid log format '{}'. Must be 'text' or 'json'", self.log_format);
        }
        if self.ledger_poll_interval_secs == 0 || self.job_poll_interval_secs == 0 {
            bail!("Poll intervals must be greater than zero");
        }
        Ok(())
    }

    fn contract(&self) -> Result<Address> {
        self.contract_address
            .trim()
            .parse()
            .with_context(|| format!("Invalid contract address '{}'", self.contract_address))
    }

    pub fn ledger_config(&self) -> Result<EthereumLedgerConfig> {
        let mut ledger = EthereumLedgerConfig::new(self.node_rpc_addr.clone(), self.contract()?);
        ledger.client_tag = self.client_tag.clone();
        ledger.profiles = self.profiles.clone();
        Ok(ledger)
    }

    pub fn jobs_config(&self) -> JobCoordinatorConfig {
        let mut jobs = JobCoordinatorConfig::new(self.manager_addr.trim_end_matches('/'));
        jobs.request_timeout = Duration::from_secs(self.job_request_timeout_secs);
        jobs.poll_interval = Duration::from_secs(self.job_poll_interval_secs);
        jobs.status_timeout = Duration::from_secs(self.job_status_timeout_secs);
        jobs.profile_id = self.profile_id;
        jobs
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            min_balance: self.min_balance,
            approved_status: JobStatus::from(self.approved_status.as_str()),
            ready_status: JobStatus::from(self.ready_status.as_str()),
            cancel_job_on_exit: self.cancel_job_on_stop,
            emitter: EmitterConfig {
                observer_timeout: Duration::from_secs(self.observer_timeout_secs),
                confirmation_timeout: Duration::from_secs(self.confirmation_timeout_secs),
                poll_interval: Duration::from_secs(self.ledger_poll_interval_secs),
                ..EmitterConfig::default()
            },
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
