//! Job monitoring queries, forwarded to the remote backend.

use chrono::{DateTime, Utc};

use crate::controller::JobController;
use crate::delegate::{JobStatus, RemoteBackend, RemoteSession};
use crate::orchestrator::OrchestratorApi;
use crate::{Error, Result};

impl<O: OrchestratorApi, B: RemoteBackend> JobController<O, B> {
    /// Current status of a job
    pub async fn status(&self, native_job_id: &str) -> Result<JobStatus> {
        let (job, session) = self.open(native_job_id, "status").await?;
        session
            .status(&job.delegate_job_id)
            .await
            .map_err(|e| Error::from_delegate(&job.credentials.host, e))
    }

    /// When the job was created, if known
    pub async fn created(&self, native_job_id: &str) -> Result<Option<DateTime<Utc>>> {
        let (job, session) = self.open(native_job_id, "created").await?;
        session
            .created(&job.delegate_job_id)
            .await
            .map_err(|e| Error::from_delegate(&job.credentials.host, e))
    }

    /// When the job started, if it has
    pub async fn started(&self, native_job_id: &str) -> Result<Option<DateTime<Utc>>> {
        let (job, session) = self.open(native_job_id, "started").await?;
        session
            .started(&job.delegate_job_id)
            .await
            .map_err(|e| Error::from_delegate(&job.credentials.host, e))
    }

    /// When the job finished, if it has
    pub async fn finished(&self, native_job_id: &str) -> Result<Option<DateTime<Utc>>> {
        let (job, session) = self.open(native_job_id, "finished").await?;
        session
            .finished(&job.delegate_job_id)
            .await
            .map_err(|e| Error::from_delegate(&job.credentials.host, e))
    }

    /// Exit code of a finished job
    pub async fn exit_code(&self, native_job_id: &str) -> Result<Option<i32>> {
        let (job, session) = self.open(native_job_id, "exit code").await?;
        session
            .exit_code(&job.delegate_job_id)
            .await
            .map_err(|e| Error::from_delegate(&job.credentials.host, e))
    }

    /// Hosts the job runs or ran on
    pub async fn execution_hosts(&self, native_job_id: &str) -> Result<Vec<String>> {
        let (job, session) = self.open(native_job_id, "execution hosts").await?;
        session
            .execution_hosts(&job.delegate_job_id)
            .await
            .map_err(|e| Error::from_delegate(&job.credentials.host, e))
    }
}
