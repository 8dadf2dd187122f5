//! Job control on provisioned resources.
//!
//! [`JobController`] keeps no state between calls. Every operation that takes
//! a native job id decodes the deployment id and access credentials from it,
//! opens a fresh session to the remote backend and forwards the call.

use std::collections::HashMap;
use tracing::{debug, error, info};

use crate::cleanup::Release;
use crate::config::{PollPolicy, ProvisionerConfig};
use crate::delegate::{RemoteBackend, RemoteSession, StagingTransfer, rewrite_scheme};
use crate::job_id::CompositeJobId;
use crate::orchestrator::OrchestratorApi;
use crate::provisioner::{ProvisionedResource, Provisioner};
use crate::{Error, Result};

/// Provisions resources and delegates job control to a remote backend
pub struct JobController<O, B> {
    pub(crate) provisioner: Provisioner<O>,
    pub(crate) backend: B,
    base_path: Option<String>,
    attributes: HashMap<String, String>,
}

impl<O: OrchestratorApi, B: RemoteBackend> JobController<O, B> {
    /// Create a controller
    pub fn new(orchestrator: O, backend: B, config: ProvisionerConfig) -> Self {
        Self {
            provisioner: Provisioner::new(orchestrator, config),
            backend,
            base_path: None,
            attributes: HashMap::new(),
        }
    }

    /// Base path passed to every backend connection
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    /// Attributes passed to every backend connection
    pub fn with_backend_attributes(mut self, attributes: HashMap<String, String>) -> Self {
        self.attributes = attributes;
        self
    }

    /// The provisioner used for deployments
    pub fn provisioner(&self) -> &Provisioner<O> {
        &self.provisioner
    }

    /// The remote backend jobs are delegated to
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Provision a resource and submit a job to it with the configured policy
    pub async fn submit(&self, description: &str, check_match: bool, unique_id: &str) -> Result<String> {
        let policy = self.provisioner.config().poll;
        self.submit_with_policy(description, check_match, unique_id, policy)
            .await
    }

    /// Provision a resource and submit a job to it.
    ///
    /// Returns the composite native job id. If anything fails after the
    /// deployment was created, the deployment is released before the error
    /// is returned.
    pub async fn submit_with_policy(
        &self,
        description: &str,
        check_match: bool,
        unique_id: &str,
        policy: PollPolicy,
    ) -> Result<String> {
        debug!("submit (begin) unique id '{}'", unique_id);
        let resource = self.provisioner.provision_with_policy(policy).await?;

        match self
            .submit_to_resource(&resource, description, check_match, unique_id)
            .await
        {
            Ok(job_id) => {
                info!(
                    "Submitted job '{}' to deployment {}",
                    job_id.delegate_job_id, job_id.deployment_id
                );
                Ok(job_id.encode())
            }
            Err(e) => {
                error!(
                    "Submission to deployment {} failed: {}",
                    resource.deployment.id,
                    e.summary()
                );
                self.provisioner
                    .release(Some(&resource.deployment.id))
                    .await;
                Err(e)
            }
        }
    }

    async fn submit_to_resource(
        &self,
        resource: &ProvisionedResource,
        description: &str,
        check_match: bool,
        unique_id: &str,
    ) -> Result<CompositeJobId> {
        let host = &resource.credentials.host;
        let session = self
            .backend
            .connect(&resource.credentials, self.base_path.as_deref(), &self.attributes)
            .await
            .map_err(|e| Error::from_delegate(host, e))?;
        let delegate_job_id = session
            .submit(description, check_match, unique_id)
            .await
            .map_err(|e| Error::from_delegate(host, e))?;

        Ok(CompositeJobId::new(
            delegate_job_id,
            resource.deployment.id.clone(),
            resource.credentials.clone(),
        ))
    }

    /// Decode a native job id and open a backend session for it
    pub(crate) async fn open(
        &self,
        native_job_id: &str,
        operation: &str,
    ) -> Result<(CompositeJobId, B::Session)> {
        let job = CompositeJobId::decode(native_job_id)?;
        let session = self.connect(&job, operation).await?;
        Ok((job, session))
    }

    async fn connect(&self, job: &CompositeJobId, operation: &str) -> Result<B::Session> {
        debug!(
            "{} job '{}' on deployment {}",
            operation, job.delegate_job_id, job.deployment_id
        );
        self.backend
            .connect(&job.credentials, self.base_path.as_deref(), &self.attributes)
            .await
            .map_err(|e| Error::from_delegate(&job.credentials.host, e))
    }

    /// Start a submitted job
    pub async fn start(&self, native_job_id: &str) -> Result<()> {
        let (job, session) = self.open(native_job_id, "start").await?;
        session
            .start(&job.delegate_job_id)
            .await
            .map_err(|e| Error::from_delegate(&job.credentials.host, e))
    }

    /// Cancel a job and release its deployment whatever the outcome
    pub async fn cancel(&self, native_job_id: &str) -> Result<()> {
        let job = CompositeJobId::decode(native_job_id)?;

        let result = async {
            let session = self.connect(&job, "cancel").await?;
            session
                .cancel(&job.delegate_job_id)
                .await
                .map_err(|e| Error::from_delegate(&job.credentials.host, e))
        }
        .await;

        if let Err(e) = &result {
            error!("Cancel of job '{}' failed: {}", job.delegate_job_id, e.summary());
        }
        self.provisioner.release(Some(&job.deployment_id)).await;
        result
    }

    /// Clean a job; the deployment is released only when cleaning succeeded
    pub async fn clean(&self, native_job_id: &str) -> Result<Release> {
        let (job, session) = self.open(native_job_id, "clean").await?;
        session
            .clean(&job.delegate_job_id)
            .await
            .map_err(|e| Error::from_delegate(&job.credentials.host, e))?;

        Ok(self.provisioner.release(Some(&job.deployment_id)).await)
    }

    /// Input staging transfers, rewritten to the logical scheme
    pub async fn input_staging_transfers(&self, native_job_id: &str) -> Result<Vec<StagingTransfer>> {
        let (job, session) = self.open(native_job_id, "input staging").await?;
        let transfers = session
            .input_staging_transfers(&job.delegate_job_id)
            .await
            .map_err(|e| Error::from_delegate(&job.credentials.host, e))?;
        Ok(self.to_logical(&transfers))
    }

    /// Output staging transfers, rewritten to the logical scheme
    pub async fn output_staging_transfers(&self, native_job_id: &str) -> Result<Vec<StagingTransfer>> {
        let (job, session) = self.open(native_job_id, "output staging").await?;
        let transfers = session
            .output_staging_transfers(&job.delegate_job_id)
            .await
            .map_err(|e| Error::from_delegate(&job.credentials.host, e))?;
        Ok(self.to_logical(&transfers))
    }

    /// Staging directory on the provisioned host.
    ///
    /// A directory in the delegate scheme is returned in the logical scheme,
    /// like the staging transfers, instead of the backend's raw value.
    pub async fn staging_directory(&self, native_job_id: &str) -> Result<String> {
        let (job, session) = self.open(native_job_id, "staging directory").await?;
        let directory = session
            .staging_directory(&job.delegate_job_id)
            .await
            .map_err(|e| Error::from_delegate(&job.credentials.host, e))?;
        let schemes = &self.provisioner.config().staging;
        Ok(rewrite_scheme(&directory, &schemes.delegate, &schemes.logical))
    }

    fn to_logical(&self, transfers: &[StagingTransfer]) -> Vec<StagingTransfer> {
        let schemes = &self.provisioner.config().staging;
        transfers
            .iter()
            .map(|transfer| {
                let rewritten = transfer.with_scheme(&schemes.delegate, &schemes.logical);
                debug!("From: '{}' to '{}'", rewritten.from, rewritten.to);
                rewritten
            })
            .collect()
    }
}
