//! Remote-execution backend seam.
//!
//! The backend that actually runs jobs on the provisioned host is an external
//! collaborator. It is consumed only through [`RemoteBackend`], which opens a
//! fresh [`RemoteSession`] against one host for every call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::deployment::AccessCredentials;

/// Failures reported by the remote-execution backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DelegateError {
    /// The host rejected the credentials
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The credentials are valid but not allowed to do this
    #[error("authorization failed: {0}")]
    AuthorizationFailed(String),

    /// The host did not answer in time
    #[error("timed out: {0}")]
    Timeout(String),

    /// A connection parameter was rejected
    #[error("bad parameter: {0}")]
    BadParameter(String),

    /// The backend does not support the operation
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Any other backend failure
    #[error("{0}")]
    NoSuccess(String),
}

/// Result type for backend calls
pub type DelegateResult<T> = std::result::Result<T, DelegateError>;

/// A single file transfer the backend needs for staging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingTransfer {
    /// Source URI
    pub from: String,
    /// Destination URI
    pub to: String,
    /// Append to the destination instead of overwriting it
    pub append: bool,
}

impl StagingTransfer {
    /// Create a new transfer
    pub fn new(from: impl Into<String>, to: impl Into<String>, append: bool) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            append,
        }
    }

    /// Rewrite both ends of the transfer from one URI scheme to another
    pub fn with_scheme(&self, from_scheme: &str, to_scheme: &str) -> Self {
        Self {
            from: rewrite_scheme(&self.from, from_scheme, to_scheme),
            to: rewrite_scheme(&self.to, from_scheme, to_scheme),
            append: self.append,
        }
    }
}

/// Replace a leading `from_scheme://` with `to_scheme://`.
///
/// Everything after the scheme separator is kept byte for byte. URIs that do
/// not carry `from_scheme` (including ones already using `to_scheme`) are
/// returned unchanged.
pub fn rewrite_scheme(uri: &str, from_scheme: &str, to_scheme: &str) -> String {
    let prefix = format!("{from_scheme}://");
    match uri.strip_prefix(&prefix) {
        Some(rest) => format!("{to_scheme}://{rest}"),
        None => uri.to_string(),
    }
}

/// Lifecycle state of a delegated job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Submitted but not started
    New,
    /// Running on the remote host
    Running,
    /// Suspended by the backend
    Suspended,
    /// Finished successfully
    Done,
    /// Cancelled by a user
    Canceled,
    /// Finished with an error
    Failed,
}

/// Status reported by the backend for one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    /// Backend-scoped job id
    pub job_id: String,
    /// Normalised state
    pub state: JobState,
    /// Backend specific status string
    pub native_state: Option<String>,
}

/// Connects to a remote host and hands out sessions for job control
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// The session type produced by [`RemoteBackend::connect`]
    type Session: RemoteSession;

    /// Open a session to the host named in `credentials`
    async fn connect(
        &self,
        credentials: &AccessCredentials,
        base_path: Option<&str>,
        attributes: &HashMap<String, String>,
    ) -> DelegateResult<Self::Session>;
}

/// Job control, staging and monitoring against one connected host.
///
/// Every `job_id` here is the backend's own id, never the composite one.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Submit a job description and return the backend job id
    async fn submit(
        &self,
        description: &str,
        check_match: bool,
        unique_id: &str,
    ) -> DelegateResult<String>;

    /// Start a submitted job
    async fn start(&self, job_id: &str) -> DelegateResult<()>;

    /// Cancel a job
    async fn cancel(&self, job_id: &str) -> DelegateResult<()>;

    /// Remove job artifacts from the host
    async fn clean(&self, job_id: &str) -> DelegateResult<()>;

    /// Transfers needed before the job runs
    async fn input_staging_transfers(&self, job_id: &str) -> DelegateResult<Vec<StagingTransfer>>;

    /// Transfers needed after the job finished
    async fn output_staging_transfers(&self, job_id: &str) -> DelegateResult<Vec<StagingTransfer>>;

    /// Directory used for staging on the host
    async fn staging_directory(&self, job_id: &str) -> DelegateResult<String>;

    /// Current job status
    async fn status(&self, job_id: &str) -> DelegateResult<JobStatus>;

    /// When the job was created
    async fn created(&self, job_id: &str) -> DelegateResult<Option<DateTime<Utc>>>;

    /// When the job started running
    async fn started(&self, job_id: &str) -> DelegateResult<Option<DateTime<Utc>>>;

    /// When the job finished
    async fn finished(&self, job_id: &str) -> DelegateResult<Option<DateTime<Utc>>>;

    /// Exit code of a finished job
    async fn exit_code(&self, job_id: &str) -> DelegateResult<Option<i32>>;

    /// Hosts the job ran on
    async fn execution_hosts(&self, job_id: &str) -> DelegateResult<Vec<String>>;
}
