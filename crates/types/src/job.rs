//! Job records returned by the job-management service.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status reported by the job service.
///
/// The values are opaque: the orchestrator only compares them for equality
/// against targets taken from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobStatus(String);

impl JobStatus {
    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobStatus {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Server-side job record for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default = "empty_status")]
    pub status: JobStatus,
    /// Consumer-facing endpoint, filled in once the job is ready.
    #[serde(default)]
    pub output_url: String,
    #[serde(default)]
    pub profile: String,
}

fn empty_status() -> JobStatus {
    JobStatus::new("")
}

impl Job {
    pub fn has_status(&self, target: &JobStatus) -> bool {
        &self.status == target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_deserialization() {
        let job: Job = serde_json::from_str(
            r#"{"status":"JOB_STATUS_READY","output_url":"https://cdn.example/hls/1.m3u8","profile":"720p"}"#,
        )
        .unwrap();
        assert!(job.has_status(&JobStatus::from("JOB_STATUS_READY")));
        assert_eq!(job.output_url, "https://cdn.example/hls/1.m3u8");
        assert_eq!(job.profile, "720p");
    }

    #[test]
    fn test_missing_fields_default() {
        let job: Job = serde_json::from_str(r#"{"status":"pending"}"#).unwrap();
        assert_eq!(job.status.as_str(), "pending");
        assert!(job.output_url.is_empty());
    }
}
