//! REST client for the job-management service.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use streamgate_types::{Address, ErrorKind, Job, JobStatus, SessionId};
use thiserror::Error;
use tracing::{debug, info};

/// Errors returned by [`JobCoordinator`].
#[derive(Debug, Error)]
pub enum JobError {
    #[error("{operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} request failed with bad {code} status")]
    Status { operation: &'static str, code: u16 },

    #[error("failed to decode {operation} response: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("timed out after {timeout_secs}s waiting for job status {target}{}", last_status_suffix(.last_status))]
    Timeout {
        target: JobStatus,
        timeout_secs: u64,
        last_status: Option<JobStatus>,
    },

    #[error("invalid job request: {0}")]
    InvalidRequest(String),
}

fn last_status_suffix(last: &Option<JobStatus>) -> String {
    match last {
        Some(status) => format!(" (last status: {})", status),
        None => String::new(),
    }
}

impl JobError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            JobError::Transport { .. } => ErrorKind::Transport,
            JobError::Status { .. } | JobError::Decode { .. } => ErrorKind::Protocol,
            JobError::Timeout { .. } => ErrorKind::Timeout,
            JobError::InvalidRequest(_) => ErrorKind::Validation,
        }
    }

    /// HTTP status code, for non-success responses.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            JobError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type JobResult<T> = std::result::Result<T, JobError>;

/// Job service settings.
#[derive(Debug, Clone)]
pub struct JobCoordinatorConfig {
    /// Base URL such as `http://manager:8080`.
    pub base_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Delay between status polls in [`JobCoordinator::await_status`].
    pub poll_interval: Duration,
    /// Overall bound for [`JobCoordinator::await_status`].
    pub status_timeout: Duration,
    pub profile_id: u64,
}

impl JobCoordinatorConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(5),
            status_timeout: Duration::from_secs(60),
            profile_id: 1,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateJobRequest {
    stream_id: u64,
    wallet_address: String,
    profile_id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateJobResponse {
    rtmp_input_url: String,
}

/// Client for job provisioning and status.
///
/// Cloning shares the underlying HTTP connection pool.
#[derive(Clone)]
pub struct JobCoordinator {
    base_url: String,
    client: reqwest::Client,
    poll_interval: Duration,
    status_timeout: Duration,
    profile_id: u64,
}

impl JobCoordinator {
    pub fn new(config: JobCoordinatorConfig) -> JobResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|source| JobError::Transport {
                operation: "client setup",
                source,
            })?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            poll_interval: config.poll_interval,
            status_timeout: config.status_timeout,
            profile_id: config.profile_id,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Provision a job for `session_id`; returns the destination the relay
    /// should publish to.
    pub async fn create_job(&self, session_id: SessionId, wallet_address: Address) -> JobResult<String> {
        const OP: &str = "create job";

        let stream_id = session_id.to_u64().ok_or_else(|| {
            JobError::InvalidRequest(format!("session id {} does not fit in 64 bits", session_id))
        })?;
        let request = CreateJobRequest {
            stream_id,
            wallet_address: wallet_address.to_string(),
            profile_id: self.profile_id,
        };

        let url = format!("{}/api/v1/job", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|source| JobError::Transport { operation: OP, source })?;

        let created: CreateJobResponse = Self::handle_response(OP, response).await?;
        debug!(%session_id, destination = %created.rtmp_input_url, "Job created");
        Ok(created.rtmp_input_url)
    }

    pub async fn get_job(&self, session_id: SessionId) -> JobResult<Job> {
        let url = format!("{}/api/v1/stream/{}", self.base_url, session_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| JobError::Transport {
                operation: "get job",
                source,
            })?;

        Self::handle_response("get job", response).await
    }

    /// Publish the session contract address to the job.
    pub async fn update_job_ledger_address(&self, session_id: SessionId, address: Address) -> JobResult<()> {
        let url = format!(
            "{}/api/v1/contract_address/{}/{}",
            self.base_url, session_id, address
        );
        self.post_empty("update job contract address", &url).await
    }

    pub async fn cancel_job(&self, session_id: SessionId) -> JobResult<()> {
        let url = format!("{}/api/v1/stream/stop/{}", self.base_url, session_id);
        self.post_empty("cancel job", &url).await
    }

    /// Poll the job until it reports `target`.
    ///
    /// Errors from individual polls end the wait immediately.
    pub async fn await_status(&self, session_id: SessionId, target: &JobStatus) -> JobResult<Job> {
        let mut last_status: Option<JobStatus> = None;

        let poll = async {
            loop {
                let job = self.get_job(session_id).await?;
                info!(%session_id, status = %job.status, "Received a job status");

                if job.has_status(target) {
                    return Ok(job);
                }
                last_status = Some(job.status);
                tokio::time::sleep(self.poll_interval).await;
            }
        };

        let result: Result<JobResult<Job>, _> = tokio::time::timeout(self.status_timeout, poll).await;

        match result {
            Ok(outcome) => outcome,
            Err(_) => Err(JobError::Timeout {
                target: target.clone(),
                timeout_secs: self.status_timeout.as_secs(),
                last_status,
            }),
        }
    }

    async fn post_empty(&self, operation: &'static str, url: &str) -> JobResult<()> {
        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|source| JobError::Transport { operation, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(JobError::Status {
                operation,
                code: status.as_u16(),
            });
        }
        Ok(())
    }

    async fn handle_response<T: for<'de> Deserialize<'de>>(
        operation: &'static str,
        response: reqwest::Response,
    ) -> JobResult<T> {
        let status = response.status();
        if !status.is_success() {
            return Err(JobError::Status {
                operation,
                code: status.as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| JobError::Decode { operation, source })
    }
}
